//! Core sequence types: the nucleotide alphabet and reference genome storage.

pub mod nucleotide;
pub mod reference;

pub use nucleotide::{reverse_complement, Nucleotide, BASES, BASE_INDEX};
pub use reference::{RefChromosome, RefGenome};
