//! Variant genomes: the overlay representation of evolved sequences.

pub mod mutation;
pub mod variant;

pub use mutation::Mutation;
pub use variant::VariantChromosome;

use std::fmt;
use std::sync::Arc;

use crate::base::RefGenome;

/// One variant individual: a label plus a variant chromosome per reference
/// chromosome.
#[derive(Debug, Clone)]
pub struct VariantGenome {
    label: Arc<str>,
    chroms: Vec<VariantChromosome>,
}

impl VariantGenome {
    /// Create a variant genome identical to the reference.
    pub fn new(label: impl Into<Arc<str>>, reference: &RefGenome) -> Self {
        let chroms = reference
            .chroms()
            .iter()
            .map(|c| VariantChromosome::new(c.clone()))
            .collect();
        Self {
            label: label.into(),
            chroms,
        }
    }

    /// The variant's label (tip name).
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of chromosomes.
    #[inline]
    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    /// Whether the genome has no chromosomes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    /// Total evolved genome size.
    pub fn total_size(&self) -> usize {
        self.chroms.iter().map(|c| c.len()).sum()
    }

    /// Borrow the chromosome at `index`.
    #[inline]
    pub fn chrom(&self, index: usize) -> &VariantChromosome {
        &self.chroms[index]
    }

    /// Mutable chromosome access.
    #[inline]
    pub fn chrom_mut(&mut self, index: usize) -> &mut VariantChromosome {
        &mut self.chroms[index]
    }

    /// Borrow all chromosomes.
    #[inline]
    pub fn chroms(&self) -> &[VariantChromosome] {
        &self.chroms
    }

    /// Replace the chromosome at `index` with an evolved one.
    pub fn set_chrom(&mut self, index: usize, chrom: VariantChromosome) {
        self.chroms[index] = chrom;
    }
}

impl fmt::Display for VariantGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VariantGenome({}, {} chromosomes)", self.label, self.chroms.len())
    }
}

/// The full set of variant genomes produced by one evolution run, indexed by
/// tip label.
#[derive(Debug, Clone)]
pub struct VariantSet {
    variants: Vec<VariantGenome>,
}

impl VariantSet {
    /// Create a set with one unevolved variant per label.
    pub fn new<S: AsRef<str>>(reference: &RefGenome, labels: &[S]) -> Self {
        let variants = labels
            .iter()
            .map(|l| VariantGenome::new(l.as_ref(), reference))
            .collect();
        Self { variants }
    }

    /// Number of variants.
    #[inline]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Borrow the variant at `index`.
    #[inline]
    pub fn variant(&self, index: usize) -> &VariantGenome {
        &self.variants[index]
    }

    /// Mutable variant access.
    #[inline]
    pub fn variant_mut(&mut self, index: usize) -> &mut VariantGenome {
        &mut self.variants[index]
    }

    /// Borrow all variants.
    #[inline]
    pub fn variants(&self) -> &[VariantGenome] {
        &self.variants
    }

    /// Find a variant by label.
    pub fn by_label(&self, label: &str) -> Option<&VariantGenome> {
        self.variants.iter().find(|v| v.label() == label)
    }
}
