//! The phylogenetic evolver.
//!
//! A Gillespie-style continuous-time walk over each tree: every edge clones
//! the parent's state into the child, recomputes the child's total mutation
//! rate, then draws exponential time jumps and applies one mutation per
//! jump until the branch length is spent. Chromosomes are independent and
//! evolve on parallel workers, each with a deterministic seed derived from
//! the master seed.
//!
//! Cancellation is cooperative: workers poll the shared abort flag at every
//! tree edge and every 128 jumps. A cancelled run still returns the variant
//! set — chromosomes that finished are fully populated — and the caller is
//! warned that the rest are partial.

use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::base::RefGenome;
use crate::errors::{EvolveError, RateModelError};
use crate::evolution::{check_gamma_regions, GammaRegions, MutationModel, MutationSampler};
use crate::genome::{VariantChromosome, VariantSet};
use crate::simulation::monitor::EvolveMonitor;
use crate::simulation::phylogeny::{ChromPhylo, PhyloInfo, PhyloTree};

/// Abort-poll interval inside the jump loop.
const JUMPS_PER_ABORT_CHECK: u32 = 128;

/// Evolve a reference genome along per-chromosome phylogenies.
///
/// Returns one variant genome per tip label (ordering taken from the first
/// tree). Workers run one chromosome each; a given `seed` reproduces the
/// same variant set for the same inputs regardless of worker scheduling.
pub fn evolve_genome(
    reference: &RefGenome,
    model: &MutationModel,
    gammas: &[GammaRegions],
    invariant: f64,
    phylo: &PhyloInfo,
    seed: u64,
    monitor: &EvolveMonitor,
) -> Result<VariantSet, EvolveError> {
    phylo.check_against(reference)?;
    let seq_sizes: Vec<usize> = reference.chroms().iter().map(|c| c.len()).collect();
    check_gamma_regions(gammas, &seq_sizes)?;
    if !(0.0..1.0).contains(&invariant) {
        return Err(RateModelError::InvalidParameter("invariant", invariant).into());
    }

    let labels: Vec<String> = phylo.tip_labels()?.to_vec();

    // One deterministic seed per chromosome, derived from the master seed.
    let mut master = Xoshiro256PlusPlus::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..reference.len()).map(|_| master.random()).collect();

    let outcomes: Result<Vec<ChromOutcome>, EvolveError> = (0..reference.len())
        .into_par_iter()
        .map(|i| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seeds[i]);
            evolve_chrom(
                reference,
                i,
                model,
                &gammas[i],
                invariant,
                &phylo.chroms[i],
                &labels,
                monitor,
                &mut rng,
            )
        })
        .collect();
    let outcomes = outcomes?;

    let mut set = VariantSet::new(reference, &labels);
    let mut cancelled = 0usize;
    for (chrom_i, outcome) in outcomes.into_iter().enumerate() {
        if outcome.aborted {
            cancelled += 1;
        }
        for (tip_i, chrom) in outcome.tips.into_iter().enumerate() {
            set.variant_mut(tip_i).set_chrom(chrom_i, chrom);
        }
    }

    if cancelled > 0 {
        warn!(
            "phylogenetic evolution was interrupted; {cancelled} of {} chromosomes \
             are partial, the rest are fully populated",
            reference.len()
        );
    } else {
        debug!("evolved {} chromosomes for {} tips", reference.len(), labels.len());
    }

    Ok(set)
}

struct ChromOutcome {
    /// One evolved chromosome per tip, in output label order.
    tips: Vec<VariantChromosome>,
    aborted: bool,
}

/// Walk every tree of one chromosome.
#[allow(clippy::too_many_arguments)]
fn evolve_chrom(
    reference: &RefGenome,
    chrom_i: usize,
    model: &MutationModel,
    regions: &GammaRegions,
    invariant: f64,
    phylo: &ChromPhylo,
    labels: &[String],
    monitor: &EvolveMonitor,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<ChromOutcome, EvolveError> {
    let ref_chrom = reference.chrom(chrom_i);
    let recombination = phylo.trees.len() > 1 || phylo.trees.iter().any(|t| t.is_ranged());

    let mut tips: Vec<VariantChromosome> = labels
        .iter()
        .map(|_| VariantChromosome::new(ref_chrom.clone()))
        .collect();

    // Site-rate categories are drawn once per chromosome and shared by the
    // whole tree walk.
    let base = MutationSampler::new(
        VariantChromosome::new(ref_chrom.clone()),
        model,
        regions,
        invariant,
        rng,
    )?;

    for tree in &phylo.trees {
        let aborted = one_tree(
            tree,
            &base,
            model,
            monitor,
            rng,
            &mut tips,
            labels,
            recombination,
            ref_chrom.len(),
        );
        if aborted {
            return Ok(ChromOutcome { tips, aborted: true });
        }
        let end = tree.end_for(ref_chrom.len());
        monitor.add_progress((end - tree.start()) as u64);
    }

    Ok(ChromOutcome {
        tips,
        aborted: false,
    })
}

/// Walk one tree, writing tip results into `tips` (replacing them, or
/// appending mutation records in recombination mode). Returns `true` when
/// the walk was aborted.
#[allow(clippy::too_many_arguments)]
fn one_tree(
    tree: &PhyloTree,
    base: &MutationSampler,
    model: &MutationModel,
    monitor: &EvolveMonitor,
    rng: &mut Xoshiro256PlusPlus,
    tips: &mut [VariantChromosome],
    labels: &[String],
    recombination: bool,
    seq_size: usize,
) -> bool {
    if monitor.is_aborted() {
        return true;
    }

    // Every node starts as a copy of the root chromosome restricted to the
    // tree's range; the edge sweep then overwrites children from parents.
    let mut template = base.clone();
    template.reset_range(model, tree.start(), tree.end_for(seq_size));
    let mut states: Vec<Option<MutationSampler>> = vec![Some(template); tree.n_nodes()];

    for (edge_i, &[b1, b2]) in tree.edges().iter().enumerate() {
        if monitor.is_aborted() {
            return true;
        }

        states[b2] = states[b1].clone();
        let Some(state) = states[b2].as_mut() else {
            continue;
        };

        // The child's total rate over its (inherited) range.
        let mut rate = state.recompute_rate(model);
        let b_len = tree.branch_lens()[edge_i];

        let mut elapsed = sample_exp(rate, rng);
        let mut jumps: u32 = 0;
        while elapsed <= b_len && state.range_active() {
            let delta = state.mutate(model, rng);
            rate = (rate + delta).max(0.0);
            elapsed += sample_exp(rate, rng);

            jumps += 1;
            if jumps % JUMPS_PER_ABORT_CHECK == 0 && monitor.is_aborted() {
                return true;
            }
        }

        // Free the parent's storage once nothing else hangs off it.
        if !tree.parent_still_needed(b1, edge_i) {
            states[b1] = None;
        }
    }

    // Transfer tip states into the output slots, matched by label.
    for tip_i in 0..tree.n_tips() {
        let label = &tree.tip_labels()[tip_i];
        let Some(slot) = labels.iter().position(|l| l == label) else {
            continue; // labels were validated; unreachable in practice
        };
        let Some(state) = states[tip_i].take() else {
            continue;
        };
        if recombination {
            tips[slot].merge_from(state.chrom());
        } else {
            tips[slot] = state.into_chrom();
        }
    }

    false
}

/// One exponential jump; an empty rate means the clock never fires.
#[inline]
fn sample_exp<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> f64 {
    if rate <= 0.0 {
        return f64::INFINITY;
    }
    match Exp::new(rate) {
        Ok(d) => d.sample(rng),
        Err(_) => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{IndelRates, SubstitutionMatrix};
    use crate::simulation::phylogeny::ChromPhylo;

    fn reference(seq: &[u8]) -> RefGenome {
        RefGenome::from_sequences(vec![("chr1", seq)], false)
    }

    fn jc_model(xi: f64, rng: &mut Xoshiro256PlusPlus) -> MutationModel {
        let matrix = SubstitutionMatrix::jc69(1.0, xi).unwrap();
        let indels = if xi > 0.0 {
            IndelRates {
                xi,
                psi: 1.0,
                rel_insertion_rates: vec![1.0],
                rel_deletion_rates: vec![1.0],
            }
        } else {
            IndelRates::none()
        };
        MutationModel::new(matrix, &indels, rng).unwrap()
    }

    fn two_tip_phylo(b_len: f64) -> PhyloInfo {
        let tree = PhyloTree::new(
            2,
            vec![[2, 0], [2, 1]],
            vec![b_len, b_len],
            vec!["a".into(), "b".into()],
        )
        .unwrap();
        PhyloInfo {
            chroms: vec![ChromPhylo::single(tree)],
        }
    }

    #[test]
    fn test_zero_branch_lengths_produce_no_mutations() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(41);
        let reference = reference(b"TCAGTCAGTC");
        let model = jc_model(0.0, &mut rng);
        let gammas = vec![GammaRegions::uniform(10)];
        let monitor = EvolveMonitor::new();

        let set = evolve_genome(
            &reference,
            &model,
            &gammas,
            0.0,
            &two_tip_phylo(0.0),
            7,
            &monitor,
        )
        .unwrap();

        for variant in set.variants() {
            assert_eq!(variant.chrom(0).n_mutations(), 0);
            assert_eq!(variant.chrom(0).materialize(), b"TCAGTCAGTC");
        }
        assert_eq!(monitor.progress(), 10);
    }

    #[test]
    fn test_long_branches_diverge_tips() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let reference = reference(b"TCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAGTCAG");
        let model = jc_model(0.0, &mut rng);
        let gammas = vec![GammaRegions::uniform(40)];
        let monitor = EvolveMonitor::new();

        let set = evolve_genome(
            &reference,
            &model,
            &gammas,
            0.0,
            &two_tip_phylo(1.0),
            7,
            &monitor,
        )
        .unwrap();

        let a = set.by_label("a").unwrap().chrom(0);
        let b = set.by_label("b").unwrap().chrom(0);
        assert!(a.n_mutations() > 0);
        assert!(b.n_mutations() > 0);
        // Independent branches must diverge.
        assert_ne!(a.materialize(), b.materialize());
    }

    #[test]
    fn test_reproducible_across_runs() {
        let reference = reference(b"TCAGTCAGTCAGTCAGTCAG");
        let gammas = vec![GammaRegions::uniform(20)];

        let run = |seed: u64| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
            let model = jc_model(0.1, &mut rng);
            let monitor = EvolveMonitor::new();
            evolve_genome(
                &reference,
                &model,
                &gammas,
                0.0,
                &two_tip_phylo(0.5),
                seed,
                &monitor,
            )
            .unwrap()
        };

        let set1 = run(5);
        let set2 = run(5);
        let set3 = run(6);

        for label in ["a", "b"] {
            assert_eq!(
                set1.by_label(label).unwrap().chrom(0).materialize(),
                set2.by_label(label).unwrap().chrom(0).materialize()
            );
        }
        // A different seed should differ somewhere (overwhelmingly likely).
        let same = set1.by_label("a").unwrap().chrom(0).materialize()
            == set3.by_label("a").unwrap().chrom(0).materialize();
        assert!(!same);
    }

    #[test]
    fn test_abort_before_start_leaves_reference_tips() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(43);
        let reference = reference(b"TCAGTCAGTC");
        let model = jc_model(0.0, &mut rng);
        let gammas = vec![GammaRegions::uniform(10)];
        let monitor = EvolveMonitor::new();
        monitor.request_abort();

        let set = evolve_genome(
            &reference,
            &model,
            &gammas,
            0.0,
            &two_tip_phylo(10.0),
            7,
            &monitor,
        )
        .unwrap();

        // Cancellation is not an error; the set exists but is unevolved.
        assert_eq!(set.len(), 2);
        for variant in set.variants() {
            assert_eq!(variant.chrom(0).n_mutations(), 0);
        }
    }

    #[test]
    fn test_validation_failures_surface() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(44);
        let reference = reference(b"TCAGTCAGTC");
        let model = jc_model(0.0, &mut rng);
        let monitor = EvolveMonitor::new();

        // Wrong gamma count.
        assert!(matches!(
            evolve_genome(
                &reference,
                &model,
                &[],
                0.0,
                &two_tip_phylo(1.0),
                7,
                &monitor
            ),
            Err(EvolveError::Gamma(_))
        ));

        // Bad invariant fraction.
        let gammas = vec![GammaRegions::uniform(10)];
        assert!(matches!(
            evolve_genome(
                &reference,
                &model,
                &gammas,
                1.5,
                &two_tip_phylo(1.0),
                7,
                &monitor
            ),
            Err(EvolveError::RateModel(_))
        ));
    }

    #[test]
    fn test_ranged_trees_append_disjoint_mutations() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(45);
        let reference = reference(b"TCAGTCAGTCAGTCAGTCAG");
        let model = jc_model(0.0, &mut rng);
        let gammas = vec![GammaRegions::uniform(20)];
        let monitor = EvolveMonitor::new();

        let left = PhyloTree::with_range(
            2,
            vec![[2, 0], [2, 1]],
            vec![2.0, 2.0],
            vec!["a".into(), "b".into()],
            0,
            Some(10),
        )
        .unwrap();
        let right = PhyloTree::with_range(
            2,
            vec![[2, 0], [2, 1]],
            vec![2.0, 2.0],
            vec!["a".into(), "b".into()],
            10,
            Some(20),
        )
        .unwrap();
        let phylo = PhyloInfo {
            chroms: vec![ChromPhylo {
                trees: vec![left, right],
            }],
        };

        let set = evolve_genome(&reference, &model, &gammas, 0.0, &phylo, 7, &monitor).unwrap();

        for variant in set.variants() {
            let chrom = variant.chrom(0);
            // Substitution-only model keeps the length.
            assert_eq!(chrom.len(), 20);
            // Positional invariant holds across the merged record lists.
            let mut cum: isize = 0;
            for m in chrom.mutations() {
                assert_eq!(m.new_pos as isize - m.old_pos as isize, cum);
                cum += m.size_modifier;
            }
        }
        // Both halves saw mutations somewhere across the two tips.
        let total: usize = set
            .variants()
            .iter()
            .map(|v| v.chrom(0).n_mutations())
            .sum();
        assert!(total > 0);
    }

    #[test]
    fn test_multi_chromosome_parallel_run() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(46);
        let reference = RefGenome::from_sequences(
            vec![
                ("chr1", b"TCAGTCAGTCAGTCAG".as_slice()),
                ("chr2", b"GGGGCCCCAAAATTTT".as_slice()),
                ("chr3", b"TTTTTTTTTTTTTTTT".as_slice()),
            ],
            false,
        );
        let model = jc_model(0.2, &mut rng);
        let gammas: Vec<GammaRegions> = (0..3).map(|_| GammaRegions::uniform(16)).collect();
        let tree = || {
            PhyloTree::new(
                3,
                vec![[3, 4], [4, 0], [4, 1], [3, 2]],
                vec![0.3, 0.4, 0.5, 0.6],
                vec!["a".into(), "b".into(), "c".into()],
            )
            .unwrap()
        };
        let phylo = PhyloInfo {
            chroms: (0..3).map(|_| ChromPhylo::single(tree())).collect(),
        };
        let monitor = EvolveMonitor::new();

        let set = evolve_genome(&reference, &model, &gammas, 0.0, &phylo, 11, &monitor).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(monitor.progress(), 48);
        for variant in set.variants() {
            assert_eq!(variant.len(), 3);
            // Every chromosome length is consistent with its records.
            for chrom in variant.chroms() {
                let total: isize = chrom.mutations().map(|m| m.size_modifier).sum();
                assert_eq!(chrom.len() as isize, chrom.ref_chrom().len() as isize + total);
            }
        }
    }
}
