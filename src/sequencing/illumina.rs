//! Illumina-style short-read simulation.
//!
//! Generates single- or paired-end reads from a variant genome with
//! position- and base-dependent quality scores and quality-driven mismatch
//! errors, plus optional read-level indel errors. Reads are produced in
//! memory through the chromosomes' chunked read-out; serializing them to
//! FASTQ (or anywhere else) is the caller's concern.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

use crate::base::{reverse_complement, BASES, BASE_INDEX};
use crate::errors::SequencingError;
use crate::genome::VariantGenome;
use crate::sampling::AliasSampler;

/// Highest representable Phred score.
const MAX_QUAL: u8 = 93;

/// One simulated read: sequence bytes plus numeric Phred scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRead {
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// A sequenced fragment: its source location plus one read (single-end) or
/// two (paired-end, the second reverse-complemented).
#[derive(Debug, Clone)]
pub struct SequencedFragment {
    pub chrom: String,
    pub start: usize,
    pub frag_len: usize,
    pub reads: Vec<SimRead>,
}

/// Per-nucleotide, per-read-position quality distributions.
#[derive(Debug, Clone)]
struct NtQuals {
    /// One sampler per read position.
    samplers: Vec<AliasSampler>,
    /// Candidate quality scores per read position.
    quals: Vec<Vec<u8>>,
}

/// Quality model for one read in a pair.
///
/// For every source nucleotide and read position, a categorical sampler
/// picks among candidate quality scores; the sampled quality then drives
/// the mismatch probability `10^(-q/10)`.
#[derive(Debug, Clone)]
pub struct QualityProfile {
    by_nt: [NtQuals; 4],
    read_length: usize,
    /// Quality score -> mismatch probability.
    mismatch_probs: Vec<f64>,
}

impl QualityProfile {
    /// Build from per-nucleotide tables: `probs[nt][pos]` weighs the
    /// candidate scores `quals[nt][pos]`.
    pub fn new(
        probs: [Vec<Vec<f64>>; 4],
        quals: [Vec<Vec<u8>>; 4],
    ) -> Result<Self, SequencingError> {
        let read_length = quals[0].len();
        if read_length == 0 {
            return Err(SequencingError::ZeroReadLength);
        }

        let mut by_nt = Vec::with_capacity(4);
        for (nt_probs, nt_quals) in probs.iter().zip(quals.iter()) {
            if nt_probs.len() != read_length || nt_quals.len() != read_length {
                return Err(SequencingError::ProfileShape {
                    expected: read_length,
                    got: nt_probs.len().min(nt_quals.len()),
                });
            }
            let mut samplers = Vec::with_capacity(read_length);
            for (p, q) in nt_probs.iter().zip(nt_quals.iter()) {
                if p.len() != q.len() {
                    return Err(SequencingError::ProfileShape {
                        expected: p.len(),
                        got: q.len(),
                    });
                }
                samplers.push(
                    AliasSampler::new(p)
                        .map_err(|_| SequencingError::InvalidProbability("quality weights", 0.0))?,
                );
            }
            by_nt.push(NtQuals {
                samplers,
                quals: nt_quals.clone(),
            });
        }
        let by_nt = match <[NtQuals; 4]>::try_from(by_nt) {
            Ok(b) => b,
            Err(_) => unreachable!("exactly four nucleotide tables are built"),
        };

        let mismatch_probs = (0..=MAX_QUAL)
            .map(|q| 10f64.powf(f64::from(q) / -10.0))
            .collect();

        Ok(Self {
            by_nt,
            read_length,
            mismatch_probs,
        })
    }

    /// A flat profile: every base and position gets the same score.
    pub fn uniform(read_length: usize, qual: u8) -> Result<Self, SequencingError> {
        let qual = qual.min(MAX_QUAL);
        let probs: Vec<Vec<f64>> = vec![vec![1.0]; read_length];
        let quals: Vec<Vec<u8>> = vec![vec![qual]; read_length];
        Self::new(
            [probs.clone(), probs.clone(), probs.clone(), probs],
            [quals.clone(), quals.clone(), quals.clone(), quals],
        )
    }

    /// Positions covered by this profile.
    #[inline]
    pub fn read_length(&self) -> usize {
        self.read_length
    }

    fn sample_qual<R: Rng + ?Sized>(&self, nt: usize, pos: usize, rng: &mut R) -> u8 {
        let table = &self.by_nt[nt.min(3)];
        let k = table.samplers[pos].sample(rng);
        table.quals[pos][k]
    }

    #[inline]
    fn mismatch_prob(&self, qual: u8) -> f64 {
        self.mismatch_probs[qual.min(MAX_QUAL) as usize]
    }
}

/// Scalar knobs for the read simulator.
#[derive(Debug, Clone)]
pub struct IlluminaConfig {
    pub read_length: usize,
    pub paired: bool,
    /// Gamma shape for fragment lengths.
    pub frag_len_shape: f64,
    /// Gamma scale for fragment lengths.
    pub frag_len_scale: f64,
    /// Fragments shorter than this are redrawn up to clamping.
    pub frag_len_min: usize,
    /// Per-base probability of a spurious insertion in the read.
    pub ins_prob: f64,
    /// Per-base probability of a spurious deletion in the read.
    pub del_prob: f64,
}

/// The assembled read simulator.
#[derive(Debug, Clone)]
pub struct IlluminaModel {
    config: IlluminaConfig,
    frag_distr: Gamma<f64>,
    profile_r1: QualityProfile,
    profile_r2: Option<QualityProfile>,
}

impl IlluminaModel {
    /// Validate the configuration and profiles. Paired-end models reuse the
    /// first profile for the mate when no second profile is given.
    pub fn new(
        config: IlluminaConfig,
        profile_r1: QualityProfile,
        profile_r2: Option<QualityProfile>,
    ) -> Result<Self, SequencingError> {
        if config.read_length == 0 {
            return Err(SequencingError::ZeroReadLength);
        }
        if profile_r1.read_length() != config.read_length {
            return Err(SequencingError::ProfileShape {
                expected: config.read_length,
                got: profile_r1.read_length(),
            });
        }
        if let Some(p2) = &profile_r2 {
            if p2.read_length() != config.read_length {
                return Err(SequencingError::ProfileShape {
                    expected: config.read_length,
                    got: p2.read_length(),
                });
            }
        }
        for (name, p) in [("ins_prob", config.ins_prob), ("del_prob", config.del_prob)] {
            if !(0.0..=1.0).contains(&p) || !p.is_finite() {
                return Err(SequencingError::InvalidProbability(name, p));
            }
        }
        for (name, v) in [
            ("frag_len_shape", config.frag_len_shape),
            ("frag_len_scale", config.frag_len_scale),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(SequencingError::InvalidFragmentLength(name, v));
            }
        }
        let frag_distr = Gamma::new(config.frag_len_shape, config.frag_len_scale)
            .map_err(|_| {
                SequencingError::InvalidFragmentLength("frag_len_shape", config.frag_len_shape)
            })?;

        Ok(Self {
            config,
            frag_distr,
            profile_r1,
            profile_r2,
        })
    }

    /// The configuration.
    #[inline]
    pub fn config(&self) -> &IlluminaConfig {
        &self.config
    }

    /// Simulate one fragment and its read(s) from a variant genome.
    ///
    /// The source chromosome is chosen in proportion to its current length,
    /// the fragment start uniformly, and the fragment length from the Gamma
    /// distribution (clamped into the chromosome). Reads shorter than the
    /// configured read length appear when the fragment is shorter.
    pub fn sample_fragment<R: Rng + ?Sized>(
        &self,
        genome: &VariantGenome,
        rng: &mut R,
    ) -> Result<SequencedFragment, SequencingError> {
        let total: usize = genome.chroms().iter().map(|c| c.len()).sum();
        if total == 0 {
            return Err(SequencingError::EmptyGenome);
        }

        // Chromosome proportional to length.
        let mut pick = rng.random_range(0..total);
        let mut chrom_i = 0;
        for (i, chrom) in genome.chroms().iter().enumerate() {
            if pick < chrom.len() {
                chrom_i = i;
                break;
            }
            pick -= chrom.len();
        }
        let chrom = genome.chrom(chrom_i);

        let drawn = self.frag_distr.sample(rng).round() as usize;
        let frag_len = drawn.max(self.config.frag_len_min).clamp(1, chrom.len());
        let start = rng.random_range(0..=chrom.len() - frag_len);

        let mut fragment = Vec::new();
        chrom.read_into(&mut fragment, start, frag_len);

        let mut reads = Vec::with_capacity(if self.config.paired { 2 } else { 1 });
        reads.push(self.build_read(&fragment, &self.profile_r1, rng));
        if self.config.paired {
            let mut mate_template = fragment.clone();
            reverse_complement(&mut mate_template);
            let profile = self.profile_r2.as_ref().unwrap_or(&self.profile_r1);
            reads.push(self.build_read(&mate_template, profile, rng));
        }

        Ok(SequencedFragment {
            chrom: chrom.name().to_string(),
            start,
            frag_len,
            reads,
        })
    }

    /// Copy bases off the fragment into a read, sampling a quality per
    /// position and corrupting the copy with quality-driven mismatches and
    /// the configured read-level indel errors.
    fn build_read<R: Rng + ?Sized>(
        &self,
        fragment: &[u8],
        profile: &QualityProfile,
        rng: &mut R,
    ) -> SimRead {
        let out_len = self.config.read_length.min(fragment.len());
        let mut seq = Vec::with_capacity(out_len);
        let mut qual = Vec::with_capacity(out_len);

        let mut frag_pos = 0usize;
        while seq.len() < self.config.read_length && frag_pos < fragment.len() {
            // Read-level indel errors shift the window inside the fragment.
            if self.config.del_prob > 0.0 && rng.random::<f64>() < self.config.del_prob {
                frag_pos += 1;
                continue;
            }
            let duplicate =
                self.config.ins_prob > 0.0 && rng.random::<f64>() < self.config.ins_prob;

            let byte = fragment[frag_pos];
            let nt = BASE_INDEX[byte as usize] as usize;
            let q = profile.sample_qual(nt, seq.len(), rng);

            let mut base = byte;
            if nt <= 3 && rng.random::<f64>() < profile.mismatch_prob(q) {
                // Replace with one of the other three bases.
                let offset = rng.random_range(1..4);
                base = BASES[(nt + offset) % 4];
            }
            seq.push(base);
            qual.push(q);

            if !duplicate {
                frag_pos += 1;
            }
        }

        SimRead { seq, qual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::RefGenome;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn genome(seq: &[u8]) -> VariantGenome {
        let reference = RefGenome::from_sequences(vec![("chr1", seq)], false);
        VariantGenome::new("tip", &reference)
    }

    fn config(read_length: usize, paired: bool) -> IlluminaConfig {
        IlluminaConfig {
            read_length,
            paired,
            frag_len_shape: 20.0,
            frag_len_scale: 10.0,
            frag_len_min: read_length,
            ins_prob: 0.0,
            del_prob: 0.0,
        }
    }

    fn perfect_model(read_length: usize, paired: bool) -> IlluminaModel {
        let profile = QualityProfile::uniform(read_length, MAX_QUAL).unwrap();
        IlluminaModel::new(config(read_length, paired), profile, None).unwrap()
    }

    #[test]
    fn test_validation() {
        let profile = QualityProfile::uniform(10, 30).unwrap();
        // Read length / profile mismatch.
        assert!(IlluminaModel::new(config(20, false), profile.clone(), None).is_err());

        let mut bad = config(10, false);
        bad.ins_prob = 1.5;
        assert!(IlluminaModel::new(bad, profile.clone(), None).is_err());

        let mut bad = config(10, false);
        bad.frag_len_scale = 0.0;
        assert!(IlluminaModel::new(bad, profile, None).is_err());

        assert!(QualityProfile::uniform(0, 30).is_err());
    }

    #[test]
    fn test_perfect_reads_match_source() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(61);
        let g = genome(b"TCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAG");
        let model = perfect_model(10, false);

        let full = g.chrom(0).materialize();
        for _ in 0..50 {
            let frag = model.sample_fragment(&g, &mut rng).unwrap();
            assert_eq!(frag.reads.len(), 1);
            let read = &frag.reads[0];
            assert_eq!(read.seq.len(), 10);
            assert_eq!(read.qual.len(), 10);

            // With maximum quality the read equals the fragment prefix.
            assert_eq!(read.seq, &full[frag.start..frag.start + 10]);
            assert!(read.qual.iter().all(|&q| q == MAX_QUAL));
        }
    }

    #[test]
    fn test_paired_end_mate_is_reverse_complement() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(62);
        let g = genome(b"TCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAG");
        let model = perfect_model(8, true);

        let frag = model.sample_fragment(&g, &mut rng).unwrap();
        assert_eq!(frag.reads.len(), 2);

        let source = g.chrom(0).materialize();
        let mut window: Vec<u8> =
            source[frag.start..frag.start + frag.frag_len].to_vec();
        reverse_complement(&mut window);
        assert_eq!(frag.reads[1].seq, window[..8].to_vec());
    }

    #[test]
    fn test_mismatch_rate_follows_quality() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(63);
        // Quality 10 -> 10% mismatches.
        let profile = QualityProfile::uniform(50, 10).unwrap();
        let model = IlluminaModel::new(config(50, false), profile, None).unwrap();
        let g = genome(&b"T".repeat(2000));

        let mut bases = 0usize;
        let mut mismatches = 0usize;
        for _ in 0..400 {
            let frag = model.sample_fragment(&g, &mut rng).unwrap();
            for &b in &frag.reads[0].seq {
                bases += 1;
                if b != b'T' {
                    mismatches += 1;
                }
            }
        }
        let rate = mismatches as f64 / bases as f64;
        assert!((rate - 0.1).abs() < 0.01, "mismatch rate {rate}");
    }

    #[test]
    fn test_n_bases_pass_through() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(64);
        let g = genome(&b"N".repeat(100));
        let profile = QualityProfile::uniform(10, 10).unwrap();
        let model = IlluminaModel::new(config(10, false), profile, None).unwrap();

        let frag = model.sample_fragment(&g, &mut rng).unwrap();
        assert!(frag.reads[0].seq.iter().all(|&b| b == b'N'));
    }

    #[test]
    fn test_read_indel_errors_shift_window() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(65);
        let mut cfg = config(20, false);
        cfg.del_prob = 0.5;
        let profile = QualityProfile::uniform(20, MAX_QUAL).unwrap();
        let model = IlluminaModel::new(cfg, profile, None).unwrap();
        let g = genome(&b"TCAG".repeat(100));

        // With heavy read-deletion errors the read consumes far more than
        // read_length fragment bases, so some reads come up short when the
        // fragment runs out; all reads stay within the configured length.
        for _ in 0..50 {
            let frag = model.sample_fragment(&g, &mut rng).unwrap();
            assert!(frag.reads[0].seq.len() <= 20);
        }
    }

    #[test]
    fn test_empty_genome_is_an_error() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(66);
        let g = genome(b"");
        let model = perfect_model(10, false);
        assert!(matches!(
            model.sample_fragment(&g, &mut rng),
            Err(SequencingError::EmptyGenome)
        ));
    }

    #[test]
    fn test_reads_reflect_variant_not_reference() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(67);
        let reference = RefGenome::from_sequences(vec![("chr1", b"TTTTTTTTTTTTTTTTTTTT".as_slice())], false);
        let mut variant = VariantGenome::new("tip", &reference);
        for pos in 0..20 {
            variant.chrom_mut(0).add_substitution(b'G', pos);
        }

        let model = perfect_model(20, false);
        let frag = model.sample_fragment(&variant, &mut rng).unwrap();
        assert!(frag.reads[0].seq.iter().all(|&b| b == b'G'));
    }
}
