//! Mutation models: rate matrices, site-rate heterogeneity, event-type
//! distributions, location sampling, and the two ways of applying them to a
//! chromosome (Gillespie jumps and whole-branch substitution sweeps).

pub mod events;
pub mod gammas;
pub mod location;
pub mod mutator;
pub mod rates;
pub mod substitution;

pub use events::{EquilibriumSampler, EventTypeSampler, IndelRates, MutationEvent};
pub use gammas::{check_gamma_regions, make_gamma_regions, GammaRegions};
pub use location::LocationSampler;
pub use mutator::{MutationModel, MutationSampler};
pub use rates::{PtSolver, SubstitutionMatrix};
pub use substitution::BranchSubstitutions;
