//! Branch-length substitution sweep.
//!
//! The alternative to Gillespie jumps: for a branch of length `b`, compute
//! P(t) = exp(Q * gamma_c * b) once per rate category, build an alias
//! sampler per source base per category, then walk the chromosome once and
//! draw each site's new base from its row. Reads go through the mutation
//! list (never the raw reference where records exist); invariant sites and
//! `N` are skipped; no indels are produced.

use rand::Rng;

use crate::base::{BASES, BASE_INDEX};
use crate::errors::RateModelError;
use crate::evolution::rates::{PtSolver, SubstitutionMatrix};
use crate::genome::VariantChromosome;

/// Precomputed per-category, per-source-base samplers for one branch.
#[derive(Debug, Clone)]
pub struct BranchSubstitutions {
    /// `samplers[category][source base]`
    samplers: Vec<[crate::sampling::AliasSampler; 4]>,
}

impl BranchSubstitutions {
    /// Precompute P(b_len * multiplier) for every rate category.
    pub fn new(
        matrix: &SubstitutionMatrix,
        multipliers: &[f64],
        b_len: f64,
    ) -> Result<Self, RateModelError> {
        if !b_len.is_finite() || b_len < 0.0 {
            return Err(RateModelError::InvalidParameter("branch length", b_len));
        }

        let solver = PtSolver::new(matrix);
        let mut samplers = Vec::with_capacity(multipliers.len());
        for &g in multipliers {
            let p = solver.probabilities(b_len * g);
            let mut rows = Vec::with_capacity(4);
            for i in 0..4 {
                let row = [p[(i, 0)], p[(i, 1)], p[(i, 2)], p[(i, 3)]];
                rows.push(crate::sampling::AliasSampler::new(&row).map_err(|_| {
                    RateModelError::InvalidParameter("transition probabilities", b_len)
                })?);
            }
            let rows = match <[crate::sampling::AliasSampler; 4]>::try_from(rows) {
                Ok(r) => r,
                Err(_) => unreachable!("exactly four rows are built"),
            };
            samplers.push(rows);
        }
        Ok(Self { samplers })
    }

    /// Walk `chrom` once, drawing a new base for every mutable site and
    /// recording the changes. `rate_inds` gives each current site's rate
    /// category (the sentinel `>= n_categories` marks invariant sites) and
    /// must be parallel to the chromosome. Returns the number of
    /// substitutions recorded.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        chrom: &mut VariantChromosome,
        rate_inds: &[u32],
        rng: &mut R,
    ) -> usize {
        debug_assert_eq!(rate_inds.len(), chrom.len());
        if self.samplers.is_empty() || chrom.is_empty() {
            return 0;
        }

        // Draw first over a read-only traversal; substitutions do not move
        // coordinates, so applying them afterwards is equivalent to editing
        // in place and keeps the traversal hint valid.
        let mut changes: Vec<(usize, u8)> = Vec::new();
        let record_positions: Vec<usize> = chrom.mutations().map(|m| m.new_pos).collect();

        let mut hint = None;
        let mut next = 0;
        for pos in 0..chrom.len() {
            while next < record_positions.len() && record_positions[next] <= pos {
                hint = Some(next);
                next += 1;
            }

            let cat = rate_inds[pos] as usize;
            if cat >= self.samplers.len() {
                continue; // invariant site
            }
            let byte = chrom.base_at_hint(pos, hint);
            let from = BASE_INDEX[byte as usize];
            if from > 3 {
                continue; // N
            }
            let to = self.samplers[cat][from as usize].sample(rng);
            if to != from as usize {
                changes.push((pos, BASES[to]));
            }
        }

        for &(pos, base) in &changes {
            chrom.add_substitution(base, pos);
        }
        changes.len()
    }
}
