//! Whole-pipeline behavior: rate models, site rates, the Gillespie walk,
//! the branch-substitution sweep, and read simulation off evolved variants.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use treevo::base::{RefGenome, BASE_INDEX};
use treevo::evolution::{
    make_gamma_regions, BranchSubstitutions, GammaRegions, IndelRates, MutationModel,
    MutationSampler, SubstitutionMatrix,
};
use treevo::genome::VariantChromosome;
use treevo::sequencing::{IlluminaConfig, IlluminaModel, QualityProfile};
use treevo::simulation::{evolve_genome, ChromPhylo, EvolveMonitor, PhyloInfo, PhyloTree};

fn reference(seq: &[u8]) -> RefGenome {
    RefGenome::from_sequences(vec![("chr1", seq)], false)
}

fn single_tip_phylo(b_len: f64) -> PhyloInfo {
    let tree = PhyloTree::new(1, vec![[1, 0]], vec![b_len], vec!["tip".into()]).unwrap();
    PhyloInfo {
        chroms: vec![ChromPhylo::single(tree)],
    }
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
fn zero_length_branch_produces_zero_mutations() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let reference = reference(b"TCAGTCAGTC");
    let matrix = SubstitutionMatrix::jc69(1.0, 0.0).unwrap();
    let model = MutationModel::new(matrix, &IndelRates::none(), &mut rng).unwrap();
    let gammas = vec![GammaRegions::uniform(10)];
    let monitor = EvolveMonitor::new();

    let set = evolve_genome(
        &reference,
        &model,
        &gammas,
        0.0,
        &single_tip_phylo(0.0),
        3,
        &monitor,
    )
    .unwrap();

    assert_eq!(set.variant(0).chrom(0).n_mutations(), 0);
}

#[test]
fn long_branches_converge_to_equilibrium_frequencies() {
    // F81 with skewed frequencies; a long branch forgets the root.
    let pi = [0.1, 0.2, 0.3, 0.4];
    let matrix = SubstitutionMatrix::f81(pi, 0.0).unwrap();
    let gammas = vec![GammaRegions::uniform(200)];
    let reference = reference(&b"T".repeat(200));

    let mut counts = [0usize; 4];
    let mut total = 0usize;
    for seed in 0..20u64 {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1000 + seed);
        let model = MutationModel::new(matrix.clone(), &IndelRates::none(), &mut rng).unwrap();
        let monitor = EvolveMonitor::new();
        let set = evolve_genome(
            &reference,
            &model,
            &gammas,
            0.0,
            &single_tip_phylo(30.0),
            seed,
            &monitor,
        )
        .unwrap();

        for &b in &set.variant(0).chrom(0).materialize() {
            counts[BASE_INDEX[b as usize] as usize] += 1;
            total += 1;
        }
    }

    for (i, &c) in counts.iter().enumerate() {
        let freq = c as f64 / total as f64;
        assert!(
            (freq - pi[i]).abs() < 0.03,
            "base {i}: frequency {freq} vs pi {}",
            pi[i]
        );
    }
}

#[test]
fn sibling_tips_diverge() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
    let reference = reference(&b"TCAG".repeat(30));
    let matrix = SubstitutionMatrix::hky85([0.2, 0.3, 0.3, 0.2], 2.0, 1.0, 0.0).unwrap();
    let model = MutationModel::new(matrix, &IndelRates::none(), &mut rng).unwrap();
    let gammas = vec![GammaRegions::uniform(120)];
    let monitor = EvolveMonitor::new();

    let set = evolve_genome(
        &reference,
        &model,
        &gammas,
        0.0,
        &two_tip_phylo(1.0),
        17,
        &monitor,
    )
    .unwrap();

    let a = set.by_label("a").unwrap().chrom(0).materialize();
    let b = set.by_label("b").unwrap().chrom(0).materialize();
    assert_ne!(a, b, "independent sibling branches must diverge");
}

#[test]
fn generated_gamma_regions_normalize_to_unit_mean() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let sizes = [5000usize, 3000, 1234];
    let all = make_gamma_regions(&sizes, 100, 0.3, &mut rng).unwrap();

    let mut weighted = 0.0;
    for regions in &all {
        let mut start = 0usize;
        for (&end, &v) in regions.ends().iter().zip(regions.values()) {
            weighted += (end - start) as f64 * v;
            start = end;
        }
    }
    let total: usize = sizes.iter().sum();
    assert!((weighted / total as f64 - 1.0).abs() < 1e-12);
}

#[test]
fn invariant_sites_never_mutate() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
    let seq = b"TCAG".repeat(50);
    let matrix = SubstitutionMatrix::jc69(1.0, 0.0).unwrap();
    let model = MutationModel::new(matrix, &IndelRates::none(), &mut rng).unwrap();

    let chrom = VariantChromosome::new(std::sync::Arc::new(
        treevo::base::RefChromosome::new("chr1", &seq, false),
    ));
    let regions = GammaRegions::uniform(seq.len());
    let mut sampler = MutationSampler::new(chrom, &model, &regions, 0.5, &mut rng).unwrap();

    let sentinel = sampler.location().n_categories() as u32;
    let invariant_sites: Vec<usize> = sampler
        .location()
        .rate_inds()
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == sentinel)
        .map(|(i, _)| i)
        .collect();
    assert!(!invariant_sites.is_empty());

    for _ in 0..500 {
        sampler.mutate(&model, &mut rng);
    }

    // Substitution-only model: positions are stable, so every invariant
    // site must still hold its original base.
    let out = sampler.chrom().materialize();
    for &pos in &invariant_sites {
        assert_eq!(out[pos], seq[pos], "invariant site {pos} mutated");
    }
}

#[test]
fn branch_sweep_matches_gillespie_statistics() {
    // The substitution-only sweep and the Gillespie walk sample the same
    // process; compare per-site change fractions under JC69.
    let n = 3000usize;
    let seq = b"T".repeat(n);
    let b_len: f64 = 0.3;
    let matrix = SubstitutionMatrix::jc69(1.0, 0.0).unwrap();

    // Expected: P(still T) = 1/4 + 3/4 exp(-b).
    let expected_changed = 1.0 - (0.25 + 0.75 * (-b_len).exp());

    // Sweep.
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
    let pass = BranchSubstitutions::new(&matrix, &[1.0], b_len).unwrap();
    let mut chrom = VariantChromosome::new(std::sync::Arc::new(
        treevo::base::RefChromosome::new("chr1", &seq, false),
    ));
    let rate_inds = vec![0u32; n];
    pass.apply(&mut chrom, &rate_inds, &mut rng);
    let sweep_changed = chrom
        .materialize()
        .iter()
        .filter(|&&b| b != b'T')
        .count() as f64
        / n as f64;

    // Gillespie via the evolver.
    let reference = reference(&seq);
    let model = MutationModel::new(matrix, &IndelRates::none(), &mut rng).unwrap();
    let gammas = vec![GammaRegions::uniform(n)];
    let monitor = EvolveMonitor::new();
    let set = evolve_genome(
        &reference,
        &model,
        &gammas,
        0.0,
        &single_tip_phylo(b_len),
        23,
        &monitor,
    )
    .unwrap();
    let gillespie_changed = set
        .variant(0)
        .chrom(0)
        .materialize()
        .iter()
        .filter(|&&b| b != b'T')
        .count() as f64
        / n as f64;

    assert!(
        (sweep_changed - expected_changed).abs() < 0.03,
        "sweep {sweep_changed} vs expected {expected_changed}"
    );
    assert!(
        (gillespie_changed - expected_changed).abs() < 0.03,
        "gillespie {gillespie_changed} vs expected {expected_changed}"
    );
}

#[test]
fn indels_change_length_but_preserve_invariants() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);
    let reference = reference(&b"TCAG".repeat(100));
    let matrix = SubstitutionMatrix::jc69(1.0, 0.4).unwrap();
    let indels = IndelRates {
        xi: 0.4,
        psi: 1.0,
        rel_insertion_rates: vec![1.0, 0.5, 0.25],
        rel_deletion_rates: vec![1.0, 0.5, 0.25],
    };
    let model = MutationModel::new(matrix, &indels, &mut rng).unwrap();
    let gammas = vec![GammaRegions::uniform(400)];
    let monitor = EvolveMonitor::new();

    let set = evolve_genome(
        &reference,
        &model,
        &gammas,
        0.0,
        &two_tip_phylo(0.5),
        29,
        &monitor,
    )
    .unwrap();

    let mut saw_indel = false;
    for variant in set.variants() {
        let chrom = variant.chrom(0);
        let total: isize = chrom.mutations().map(|m| m.size_modifier).sum();
        assert_eq!(chrom.len() as isize, 400 + total);
        if chrom.mutations().any(|m| m.size_modifier != 0) {
            saw_indel = true;
        }

        let mut cum: isize = 0;
        for m in chrom.mutations() {
            assert_eq!(m.new_pos as isize - m.old_pos as isize, cum);
            cum += m.size_modifier;
        }
    }
    assert!(saw_indel, "no indels at xi = 0.4 over 400 sites");
}

#[test]
fn reads_from_evolved_variants_carry_their_mutations() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
    let reference = reference(&b"TCAG".repeat(100));
    let matrix = SubstitutionMatrix::jc69(1.0, 0.0).unwrap();
    let model = MutationModel::new(matrix, &IndelRates::none(), &mut rng).unwrap();
    let gammas = vec![GammaRegions::uniform(400)];
    let monitor = EvolveMonitor::new();

    let set = evolve_genome(
        &reference,
        &model,
        &gammas,
        0.0,
        &two_tip_phylo(0.8),
        31,
        &monitor,
    )
    .unwrap();

    let variant = set.by_label("a").unwrap();
    let evolved = variant.chrom(0).materialize();

    let profile = QualityProfile::uniform(50, 93).unwrap();
    let config = IlluminaConfig {
        read_length: 50,
        paired: false,
        frag_len_shape: 30.0,
        frag_len_scale: 5.0,
        frag_len_min: 50,
        ins_prob: 0.0,
        del_prob: 0.0,
    };
    let sequencer = IlluminaModel::new(config, profile, None).unwrap();

    for _ in 0..100 {
        let frag = sequencer.sample_fragment(variant, &mut rng).unwrap();
        let read = &frag.reads[0];
        // Error-free reads are exact windows of the evolved sequence, not
        // of the reference.
        assert_eq!(
            &read.seq[..],
            &evolved[frag.start..frag.start + read.seq.len()]
        );
    }
}
