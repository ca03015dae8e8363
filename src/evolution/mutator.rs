//! The mutation sampler: one Gillespie event at a time.
//!
//! [`MutationModel`] is the read-only composition shared by every lineage
//! (rate matrix, event-type sampler, equilibrium draw for inserted bases).
//! [`MutationSampler`] is the per-lineage state: the variant chromosome plus
//! its site-weight bookkeeping. The evolver clones samplers from parent to
//! child along tree edges, so cloning must stay cheap relative to the
//! chromosome size.

use rand::Rng;

use crate::base::Nucleotide;
use crate::errors::RateModelError;
use crate::evolution::events::{EquilibriumSampler, EventTypeSampler, IndelRates, MutationEvent};
use crate::evolution::gammas::GammaRegions;
use crate::evolution::location::LocationSampler;
use crate::evolution::rates::SubstitutionMatrix;
use crate::genome::VariantChromosome;

/// Shared, read-only mutation machinery for one rate model.
#[derive(Debug, Clone)]
pub struct MutationModel {
    matrix: SubstitutionMatrix,
    events: EventTypeSampler,
    insertions: EquilibriumSampler,
}

impl MutationModel {
    /// Compose the model from a rate matrix and indel parameters.
    pub fn new<R: Rng + ?Sized>(
        matrix: SubstitutionMatrix,
        indels: &IndelRates,
        rng: &mut R,
    ) -> Result<Self, RateModelError> {
        let events = EventTypeSampler::new(&matrix, indels, rng)?;
        let insertions = EquilibriumSampler::new(matrix.pi(), rng)?;
        Ok(Self {
            matrix,
            events,
            insertions,
        })
    }

    /// The substitution-rate matrix.
    #[inline]
    pub fn matrix(&self) -> &SubstitutionMatrix {
        &self.matrix
    }

    /// The per-base event-type sampler.
    #[inline]
    pub fn events(&self) -> &EventTypeSampler {
        &self.events
    }

    /// The equilibrium-frequency base generator.
    #[inline]
    pub fn insertions(&self) -> &EquilibriumSampler {
        &self.insertions
    }
}

/// Per-lineage mutation state: a variant chromosome plus its location
/// sampler.
#[derive(Debug, Clone)]
pub struct MutationSampler {
    chrom: VariantChromosome,
    location: LocationSampler,
}

impl MutationSampler {
    /// Bind a chromosome to fresh site-rate state drawn from `regions` and
    /// the invariant-site fraction.
    pub fn new<R: Rng + ?Sized>(
        chrom: VariantChromosome,
        model: &MutationModel,
        regions: &GammaRegions,
        invariant: f64,
        rng: &mut R,
    ) -> Result<Self, RateModelError> {
        let mut location = LocationSampler::new(regions, invariant, rng)?;
        location.rebuild(&chrom, model.events());
        Ok(Self { chrom, location })
    }

    /// The current chromosome.
    #[inline]
    pub fn chrom(&self) -> &VariantChromosome {
        &self.chrom
    }

    /// Consume the sampler, keeping the evolved chromosome.
    #[inline]
    pub fn into_chrom(self) -> VariantChromosome {
        self.chrom
    }

    /// The location-sampling state.
    #[inline]
    pub fn location(&self) -> &LocationSampler {
        &self.location
    }

    /// Current total mutation rate over the active range.
    #[inline]
    pub fn total_rate(&self) -> f64 {
        self.location.total()
    }

    /// Whether the active range still contains sites.
    #[inline]
    pub fn range_active(&self) -> bool {
        self.location.range_active() && !self.chrom.is_empty()
    }

    /// Restrict mutation to `[start, end)` and recompute the total rate.
    pub fn reset_range(&mut self, model: &MutationModel, start: usize, end_excl: usize) {
        self.location
            .set_range(start, end_excl, &self.chrom, model.events());
    }

    /// Recompute the total rate over the current range (used at the top of
    /// each tree edge).
    pub fn recompute_rate(&mut self, model: &MutationModel) -> f64 {
        self.location.rebuild(&self.chrom, model.events());
        self.location.total()
    }

    /// Apply one mutation event and return the signed change in the
    /// chromosome's total outgoing rate, so the caller can update its
    /// Gillespie clock without rescanning.
    ///
    /// Sites holding `N` (or invariant sites) carry zero weight and are
    /// never selected; if nothing in range can mutate, returns 0 and leaves
    /// the chromosome untouched. Deletions running past the range end are
    /// clamped.
    pub fn mutate<R: Rng + ?Sized>(&mut self, model: &MutationModel, rng: &mut R) -> f64 {
        let Some(pos) = self.location.sample(&self.chrom, model.events(), rng) else {
            return 0.0;
        };
        let byte = self.chrom.base_at(pos);
        let Some(base) = Nucleotide::from_ascii(byte) else {
            // Weight-zero sites are never drawn; nothing to do.
            return 0.0;
        };

        match model.events().sample(base, rng) {
            MutationEvent::Substitution(target) => {
                self.chrom.add_substitution(target.to_ascii(), pos);
                let gamma = self.location.multiplier_at(pos);
                let delta = gamma
                    * (model.events().total_rate(target) - model.events().total_rate(base));
                self.location.apply_substitution(pos, delta);
                delta
            }
            MutationEvent::Insertion(len) => {
                let before = self.location.total();
                let mut bases = Vec::with_capacity(len + 1);
                bases.push(byte);
                model.insertions().extend(&mut bases, len, rng);
                self.chrom.add_insertion(&bases, pos);
                self.location
                    .apply_insertion(pos, len, &self.chrom, model.events());
                self.location.total() - before
            }
            MutationEvent::Deletion(len) => {
                let before = self.location.total();
                // Clamp at the active range end.
                let len = len.min(self.location.end_excl() - pos);
                if len == 0 {
                    return 0.0;
                }
                let removed = len.min(self.chrom.len() - pos);
                self.chrom.add_deletion(len, pos);
                self.location
                    .apply_deletion(pos, removed, &self.chrom, model.events());
                self.location.total() - before
            }
        }
    }
}
