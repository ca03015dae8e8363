//! Phylogenetic input model.
//!
//! Per chromosome the caller supplies one or more trees as a flat edge list:
//! node indices `0..n_tips` are tips, higher indices internal nodes, and the
//! root is the one node with no incoming edge. A tree may be restricted to a
//! subrange of its chromosome; several range-restricted trees per chromosome
//! describe a recombining history, with each tree's tip results appended
//! into the same variants.

use serde::{Deserialize, Serialize};

use crate::base::RefGenome;
use crate::errors::PhylogenyError;

/// One phylogenetic tree: edges, branch lengths, tip labels, and an optional
/// chromosome subrange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyloTree {
    n_tips: usize,
    edges: Vec<[usize; 2]>,
    branch_lens: Vec<f64>,
    tip_labels: Vec<String>,
    /// First position this tree covers.
    start: usize,
    /// Exclusive end of the covered range; `None` means the whole
    /// chromosome.
    end: Option<usize>,
}

impl PhyloTree {
    /// Validate and build a whole-chromosome tree.
    pub fn new(
        n_tips: usize,
        edges: Vec<[usize; 2]>,
        branch_lens: Vec<f64>,
        tip_labels: Vec<String>,
    ) -> Result<Self, PhylogenyError> {
        Self::with_range(n_tips, edges, branch_lens, tip_labels, 0, None)
    }

    /// Validate and build a tree covering `[start, end)` of its chromosome.
    pub fn with_range(
        n_tips: usize,
        edges: Vec<[usize; 2]>,
        branch_lens: Vec<f64>,
        tip_labels: Vec<String>,
        start: usize,
        end: Option<usize>,
    ) -> Result<Self, PhylogenyError> {
        if edges.is_empty() {
            return Err(PhylogenyError::EmptyPhylogeny);
        }
        if edges.len() != branch_lens.len() {
            return Err(PhylogenyError::EdgeCountMismatch {
                edges: edges.len(),
                lens: branch_lens.len(),
            });
        }
        if tip_labels.len() != n_tips {
            return Err(PhylogenyError::TipCountMismatch {
                n_tips,
                labels: tip_labels.len(),
            });
        }
        // Edges + root account for every node exactly once in a tree.
        let n_nodes = edges.len() + 1;
        for &[parent, child] in &edges {
            for index in [parent, child] {
                if index >= n_nodes {
                    return Err(PhylogenyError::NodeOutOfRange { index, n_nodes });
                }
            }
        }
        for (index, &len) in branch_lens.iter().enumerate() {
            if !len.is_finite() || len < 0.0 {
                return Err(PhylogenyError::InvalidBranchLength { index, value: len });
            }
        }
        Ok(Self {
            n_tips,
            edges,
            branch_lens,
            tip_labels,
            start,
            end,
        })
    }

    /// Number of tips.
    #[inline]
    pub fn n_tips(&self) -> usize {
        self.n_tips
    }

    /// Number of edges.
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Total number of nodes (tips + internal).
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.edges.len() + 1
    }

    /// The edge list as `[parent, child]` rows.
    #[inline]
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Branch lengths, parallel to the edge list.
    #[inline]
    pub fn branch_lens(&self) -> &[f64] {
        &self.branch_lens
    }

    /// Tip labels for node indices `0..n_tips`.
    #[inline]
    pub fn tip_labels(&self) -> &[String] {
        &self.tip_labels
    }

    /// Start of the covered range.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Exclusive end of the covered range for a chromosome of `seq_size`.
    #[inline]
    pub fn end_for(&self, seq_size: usize) -> usize {
        self.end.unwrap_or(seq_size)
    }

    /// Whether this tree covers only part of its chromosome.
    #[inline]
    pub fn is_ranged(&self) -> bool {
        self.start > 0 || self.end.is_some()
    }

    /// Whether node `b1` still has outgoing edges after edge `edge_i`.
    pub fn parent_still_needed(&self, b1: usize, edge_i: usize) -> bool {
        self.edges[edge_i + 1..].iter().any(|e| e[0] == b1)
    }

    fn check_range(&self, seq_size: usize) -> Result<(), PhylogenyError> {
        let end = self.end_for(seq_size);
        if self.start >= end || end > seq_size {
            return Err(PhylogenyError::InvalidRange {
                start: self.start,
                end,
                seq_size,
            });
        }
        Ok(())
    }
}

/// All trees for one chromosome, in the order their ranges are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromPhylo {
    pub trees: Vec<PhyloTree>,
}

impl ChromPhylo {
    /// A single whole-chromosome tree.
    pub fn single(tree: PhyloTree) -> Self {
        Self { trees: vec![tree] }
    }
}

/// Phylogenetic input for a whole genome: one [`ChromPhylo`] per reference
/// chromosome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyloInfo {
    pub chroms: Vec<ChromPhylo>,
}

impl PhyloInfo {
    /// Validate against a reference genome: matching chromosome counts,
    /// non-empty trees, ranges inside their chromosomes, and tip labels
    /// consistent with the first tree's ordering.
    pub fn check_against(&self, reference: &RefGenome) -> Result<(), PhylogenyError> {
        if self.chroms.is_empty() {
            return Err(PhylogenyError::EmptyPhylogeny);
        }
        if self.chroms.len() != reference.len() {
            return Err(PhylogenyError::ChromCountMismatch {
                trees: self.chroms.len(),
                chroms: reference.len(),
            });
        }

        let labels = self.tip_labels()?;
        for (chrom_phylo, ref_chrom) in self.chroms.iter().zip(reference.chroms()) {
            if chrom_phylo.trees.is_empty() {
                return Err(PhylogenyError::EmptyPhylogeny);
            }
            for tree in &chrom_phylo.trees {
                tree.check_range(ref_chrom.len())?;
                for label in tree.tip_labels() {
                    if !labels.contains(label) {
                        return Err(PhylogenyError::UnknownTipLabel(label.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// The output variant ordering: tip labels of the first tree.
    pub fn tip_labels(&self) -> Result<&[String], PhylogenyError> {
        self.chroms
            .first()
            .and_then(|c| c.trees.first())
            .map(|t| t.tip_labels())
            .ok_or(PhylogenyError::EmptyPhylogeny)
    }
}
