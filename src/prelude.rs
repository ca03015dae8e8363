//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use treevo::prelude::*;
//!
//! let reference = RefGenome::from_sequences(vec![("chr1", b"TCAGTCAG".as_slice())], false);
//! let variant = VariantGenome::new("tip", &reference);
//! assert_eq!(variant.chrom(0).len(), 8);
//! ```

pub use crate::base::{Nucleotide, RefChromosome, RefGenome};
pub use crate::errors;
pub use crate::evolution::{
    make_gamma_regions, GammaRegions, IndelRates, MutationModel, MutationSampler,
    SubstitutionMatrix,
};
pub use crate::genome::{Mutation, VariantChromosome, VariantGenome, VariantSet};
pub use crate::sequencing::{IlluminaConfig, IlluminaModel, QualityProfile};
pub use crate::simulation::{evolve_genome, ChromPhylo, EvolveMonitor, PhyloInfo, PhyloTree};
