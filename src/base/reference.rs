//! Reference genome storage.
//!
//! A reference genome is a set of named, immutable chromosomes. Sequence
//! bytes are sanitized once at load time; after construction the reference
//! is read-only and shared (`Arc`) by every variant chromosome derived from
//! it, so it must outlive them all.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::errors::ReferenceError;

/// One reference chromosome: a name plus an immutable nucleotide string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefChromosome {
    name: Arc<str>,
    seq: Vec<u8>,
}

impl RefChromosome {
    /// Create a chromosome from raw bytes, sanitizing as described in
    /// [`RefGenome::from_sequences`].
    pub fn new(name: impl Into<Arc<str>>, seq: &[u8], remove_soft_mask: bool) -> Self {
        let seq = seq.iter().map(|&b| sanitize(b, remove_soft_mask)).collect();
        Self {
            name: name.into(),
            seq,
        }
    }

    /// Return the chromosome name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the sequence length in bases.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Return `true` if the chromosome contains no bases.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Borrow the sequence bytes.
    #[inline]
    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    /// Return the byte at `pos`.
    ///
    /// Panics if `pos` is out of bounds, matching slice indexing.
    #[inline(always)]
    pub fn base(&self, pos: usize) -> u8 {
        self.seq[pos]
    }
}

impl fmt::Display for RefChromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefChromosome({}, {} bp)", self.name, self.len())
    }
}

/// Map a raw input byte to the stored alphabet `{T, C, A, G, N}`.
///
/// Lowercase `tcag` marks soft-masked (repeat) regions in most assemblies:
/// with `remove_soft_mask` they are uppercased into regular bases, otherwise
/// they are masked to `N`. Anything outside the recognized set becomes `N`.
#[inline]
fn sanitize(byte: u8, remove_soft_mask: bool) -> u8 {
    match byte {
        b'T' | b'C' | b'A' | b'G' | b'N' => byte,
        b't' | b'c' | b'a' | b'g' => {
            if remove_soft_mask {
                byte.to_ascii_uppercase()
            } else {
                b'N'
            }
        }
        _ => b'N',
    }
}

/// A reference genome: shared, immutable chromosomes.
#[derive(Debug, Clone)]
pub struct RefGenome {
    chroms: Vec<Arc<RefChromosome>>,
    old_names: Vec<Arc<str>>,
}

impl RefGenome {
    /// Build a reference genome from `(name, sequence)` pairs.
    ///
    /// Every byte outside `{A, C, G, T, N, a, c, g, t, n}` is replaced with
    /// `N`. Soft-masked (lowercase) bases are uppercased when
    /// `remove_soft_mask` is set and masked to `N` otherwise.
    pub fn from_sequences<'a, I>(pairs: I, remove_soft_mask: bool) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let chroms = pairs
            .into_iter()
            .map(|(name, seq)| Arc::new(RefChromosome::new(name, seq, remove_soft_mask)))
            .collect();
        Self {
            chroms,
            old_names: Vec::new(),
        }
    }

    /// Number of chromosomes.
    #[inline]
    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    /// Return `true` if the genome has no chromosomes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    /// Total genome size in bases.
    pub fn total_size(&self) -> usize {
        self.chroms.iter().map(|c| c.len()).sum()
    }

    /// Borrow the chromosome list.
    #[inline]
    pub fn chroms(&self) -> &[Arc<RefChromosome>] {
        &self.chroms
    }

    /// Shared handle to the chromosome at `index`.
    #[inline]
    pub fn chrom(&self, index: usize) -> &Arc<RefChromosome> {
        &self.chroms[index]
    }

    /// Names replaced by [`RefGenome::merge_chromosomes`], in merge order.
    #[inline]
    pub fn old_names(&self) -> &[Arc<str>] {
        &self.old_names
    }

    /// Merge all chromosomes into a single one named `"MERGE"`.
    ///
    /// Chromosome order is shuffled first so that merge-point positions are
    /// not biased toward the input order. Old names are retained in
    /// [`RefGenome::old_names`].
    pub fn merge_chromosomes<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.chroms.len() <= 1 {
            return;
        }

        self.chroms.shuffle(rng);

        let mut merged = Vec::with_capacity(self.total_size());
        for chrom in &self.chroms {
            merged.extend_from_slice(chrom.seq());
            self.old_names.push(chrom.name.clone());
        }

        self.chroms = vec![Arc::new(RefChromosome {
            name: Arc::from("MERGE"),
            seq: merged,
        })];
    }

    /// Filter chromosomes by minimum size, or keep the largest set covering
    /// `out_prop` of the total genome size.
    ///
    /// Exactly one of the two criteria must be non-zero.
    pub fn filter_chromosomes(
        &mut self,
        min_size: usize,
        out_prop: f64,
    ) -> Result<(), ReferenceError> {
        if min_size == 0 && out_prop <= 0.0 {
            return Err(ReferenceError::NoFilterCriterion);
        }
        if min_size > 0 && out_prop > 0.0 {
            return Err(ReferenceError::ConflictingFilterCriteria);
        }
        if out_prop > 1.0 {
            return Err(ReferenceError::InvalidProportion(out_prop));
        }

        // Largest first.
        self.chroms.sort_by(|a, b| b.len().cmp(&a.len()));

        if min_size > 0 {
            if self.chroms.iter().all(|c| c.len() >= min_size) {
                return Ok(());
            }
            if self.chroms.first().is_none_or(|c| c.len() < min_size) {
                return Err(ReferenceError::MinSizeTooLarge {
                    min_size,
                    largest: self.chroms.first().map_or(0, |c| c.len()),
                });
            }
            self.chroms.retain(|c| c.len() >= min_size);
        } else {
            let total = self.total_size() as f64;
            let mut kept = 0usize;
            let mut covered = 0.0;
            for chrom in &self.chroms {
                kept += 1;
                covered += chrom.len() as f64;
                if covered / total >= out_prop {
                    break;
                }
            }
            self.chroms.truncate(kept);
        }

        Ok(())
    }
}
