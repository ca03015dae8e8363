//! Per-base mutation-event distributions.
//!
//! For each source base the possible outcomes are the three substitution
//! targets, every insertion length, and every deletion length. Their
//! probabilities come from the rate matrix and the indel parameters,
//! normalized by the base's total outgoing rate, and are drawn through an
//! O(1) table sampler.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::base::{Nucleotide, BASES, BASE_INDEX};
use crate::errors::RateModelError;
use crate::sampling::CategoricalSampler;
use crate::evolution::rates::SubstitutionMatrix;

/// Indel parameters: total rate, insertion/deletion partition, and relative
/// rates per length.
///
/// The insertion rate is `xi * psi / (psi + 1)` and the deletion rate
/// `xi / (psi + 1)`; each is spread over the lengths `1..=L` in proportion
/// to the relative-rate vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndelRates {
    pub xi: f64,
    pub psi: f64,
    pub rel_insertion_rates: Vec<f64>,
    pub rel_deletion_rates: Vec<f64>,
}

impl IndelRates {
    /// No indels at all.
    pub fn none() -> Self {
        Self {
            xi: 0.0,
            psi: 1.0,
            rel_insertion_rates: Vec::new(),
            rel_deletion_rates: Vec::new(),
        }
    }

    /// Indels with rate `xi`, insertion/deletion ratio `psi`, and relative
    /// length rates `rate_i ~ exp(-lambda * i)` up to `max_length` for both
    /// kinds. Lengths decay the way short indels dominate real data.
    pub fn geometric(xi: f64, psi: f64, lambda: f64, max_length: usize) -> Self {
        let rel: Vec<f64> = (1..=max_length)
            .map(|i| (-lambda * i as f64).exp())
            .collect();
        Self {
            xi,
            psi,
            rel_insertion_rates: rel.clone(),
            rel_deletion_rates: rel,
        }
    }

    fn validate(&self) -> Result<(), RateModelError> {
        if !self.xi.is_finite() || self.xi < 0.0 {
            return Err(RateModelError::InvalidParameter("xi", self.xi));
        }
        if !self.psi.is_finite() || self.psi <= 0.0 {
            return Err(RateModelError::InvalidParameter("psi", self.psi));
        }
        if self.xi > 0.0
            && self.rel_insertion_rates.is_empty()
            && self.rel_deletion_rates.is_empty()
        {
            return Err(RateModelError::MissingIndelLengths);
        }
        for &r in self
            .rel_insertion_rates
            .iter()
            .chain(self.rel_deletion_rates.iter())
        {
            if !r.is_finite() || r < 0.0 {
                return Err(RateModelError::InvalidParameter("relative indel rate", r));
            }
        }
        Ok(())
    }
}

/// One sampled mutation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEvent {
    /// Replace the source base with this one.
    Substitution(Nucleotide),
    /// Insert this many new bases after the site.
    Insertion(usize),
    /// Delete this many bases starting at the site.
    Deletion(usize),
}

/// Per-source-base samplers over every mutation outcome.
#[derive(Debug, Clone)]
pub struct EventTypeSampler {
    samplers: [CategoricalSampler; 4],
    /// Total outgoing rate per base; the per-site weight before the
    /// rate-category multiplier.
    base_rates: [f64; 4],
    n_insertion_lengths: usize,
}

impl EventTypeSampler {
    /// Build the outcome distributions for all four bases.
    pub fn new<R: Rng + ?Sized>(
        matrix: &SubstitutionMatrix,
        indels: &IndelRates,
        rng: &mut R,
    ) -> Result<Self, RateModelError> {
        indels.validate()?;

        let n_ins = indels.rel_insertion_rates.len();
        let n_del = indels.rel_deletion_rates.len();
        let n_outcomes = 4 + n_ins + n_del;

        // Spread the insertion and deletion rates over their lengths.
        let ins_total: f64 = indels.rel_insertion_rates.iter().sum();
        let del_total: f64 = indels.rel_deletion_rates.iter().sum();
        let xi_ins = indels.xi / (1.0 + 1.0 / indels.psi);
        let xi_del = indels.xi / (1.0 + indels.psi);
        let ins_rates: Vec<f64> = indels
            .rel_insertion_rates
            .iter()
            .map(|&r| if ins_total > 0.0 { r / ins_total * xi_ins } else { 0.0 })
            .collect();
        let del_rates: Vec<f64> = indels
            .rel_deletion_rates
            .iter()
            .map(|&r| if del_total > 0.0 { r / del_total * xi_del } else { 0.0 })
            .collect();

        let mut base_rates = [0.0; 4];
        let mut samplers = Vec::with_capacity(4);
        for i in 0..4 {
            let total = matrix.total_rate(
                Nucleotide::from_index(i as u8).ok_or(RateModelError::MatrixShape {
                    rows: 4,
                    cols: 4,
                })?,
            );
            if total <= 0.0 {
                return Err(RateModelError::InvalidParameter("total rate", total));
            }
            base_rates[i] = total;

            let mut probs = Vec::with_capacity(n_outcomes);
            for j in 0..4 {
                if j == i {
                    probs.push(0.0);
                } else {
                    probs.push(matrix.q()[(i, j)] / total);
                }
            }
            probs.extend(ins_rates.iter().map(|&r| r / total));
            probs.extend(del_rates.iter().map(|&r| r / total));

            samplers.push(CategoricalSampler::table(&probs, rng).map_err(|_| {
                RateModelError::InvalidParameter("event probabilities", total)
            })?);
        }

        let samplers = match <[CategoricalSampler; 4]>::try_from(samplers) {
            Ok(s) => s,
            Err(_) => unreachable!("exactly four samplers are built"),
        };

        Ok(Self {
            samplers,
            base_rates,
            n_insertion_lengths: n_ins,
        })
    }

    /// Total outgoing rate of `base`.
    #[inline]
    pub fn total_rate(&self, base: Nucleotide) -> f64 {
        self.base_rates[base.to_index() as usize]
    }

    /// Total outgoing rate for a raw sequence byte; 0 for `N` and anything
    /// else outside the alphabet.
    #[inline]
    pub fn byte_rate(&self, byte: u8) -> f64 {
        let idx = BASE_INDEX[byte as usize];
        if idx > 3 {
            0.0
        } else {
            self.base_rates[idx as usize]
        }
    }

    /// Draw an outcome for a site currently holding `base`.
    pub fn sample<R: Rng + ?Sized>(&self, base: Nucleotide, rng: &mut R) -> MutationEvent {
        let k = self.samplers[base.to_index() as usize].sample(rng);
        if k < 4 {
            // The sampler gives the source base probability 0, so this
            // conversion cannot land on `base` itself.
            match Nucleotide::from_index(k as u8) {
                Some(target) => MutationEvent::Substitution(target),
                None => MutationEvent::Substitution(base),
            }
        } else if k < 4 + self.n_insertion_lengths {
            MutationEvent::Insertion(k - 3)
        } else {
            MutationEvent::Deletion(k - 3 - self.n_insertion_lengths)
        }
    }
}

/// Draws random bases from the equilibrium frequencies; used to generate
/// inserted sequence.
#[derive(Debug, Clone)]
pub struct EquilibriumSampler {
    sampler: CategoricalSampler,
}

impl EquilibriumSampler {
    /// Build from the model's equilibrium frequencies.
    pub fn new<R: Rng + ?Sized>(pi: &[f64; 4], rng: &mut R) -> Result<Self, RateModelError> {
        let sampler = CategoricalSampler::table(pi, rng)
            .map_err(|_| RateModelError::BadFrequencies { sum: pi.iter().sum() })?;
        Ok(Self { sampler })
    }

    /// Draw one base.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        BASES[self.sampler.sample(rng)]
    }

    /// Append `n` random bases to `out`.
    pub fn extend<R: Rng + ?Sized>(&self, out: &mut Vec<u8>, n: usize, rng: &mut R) {
        out.reserve(n);
        for _ in 0..n {
            out.push(self.sample(rng));
        }
    }
}
