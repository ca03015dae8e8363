//! Phylogenetic simulation: input model, shared monitor, and the parallel
//! evolver.

pub mod evolver;
pub mod monitor;
pub mod phylogeny;

pub use evolver::evolve_genome;
pub use monitor::EvolveMonitor;
pub use phylogeny::{ChromPhylo, PhyloInfo, PhyloTree};
