//! # treevo
//!
//! Phylogenomic sequence evolution and short-read simulation.
//!
//! Given a reference genome and a phylogenetic tree per chromosome, the
//! crate evolves independent lineages along tree branches with
//! substitutions, insertions, and deletions drawn from standard
//! nucleotide-substitution models with site-rate heterogeneity. Evolved
//! genomes are held as overlays (reference + ordered mutation records)
//! rather than materialized strings, and short reads with realistic quality
//! and error profiles can be simulated straight from the overlays.
//!
//! The main entry points are [`simulation::evolve_genome`] for the
//! phylogenetic walk and [`sequencing::IlluminaModel`] for read simulation;
//! see [`prelude`] for the common imports.

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod prelude;
pub mod sampling;
pub mod sequencing;
pub mod simulation;

pub use base::{Nucleotide, RefChromosome, RefGenome};
pub use genome::{VariantChromosome, VariantGenome, VariantSet};
