//! In-memory short-read simulation from variant genomes.

pub mod illumina;

pub use illumina::{IlluminaConfig, IlluminaModel, QualityProfile, SequencedFragment, SimRead};
