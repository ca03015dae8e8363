//! O(1) categorical samplers.
//!
//! Two interchangeable methods are provided: the four-table condensed method
//! and Walker's alias method. Both draw from a fixed discrete distribution in
//! constant time; the choice is made once at construction and carried as a
//! tagged variant.

pub mod alias;
pub mod table;

pub use alias::AliasSampler;
pub use table::TableSampler;

use rand::Rng;

use crate::errors::SamplerError;

/// A categorical sampler chosen at construction time.
#[derive(Debug, Clone)]
pub enum CategoricalSampler {
    Table(TableSampler),
    Alias(AliasSampler),
}

impl CategoricalSampler {
    /// Build a table sampler.
    pub fn table<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<Self, SamplerError> {
        Ok(Self::Table(TableSampler::new(weights, rng)?))
    }

    /// Build an alias sampler.
    pub fn alias(weights: &[f64]) -> Result<Self, SamplerError> {
        Ok(Self::Alias(AliasSampler::new(weights)?))
    }

    /// Draw a category index.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self {
            Self::Table(s) => s.sample(rng),
            Self::Alias(s) => s.sample(rng),
        }
    }
}
