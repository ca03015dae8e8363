//! Nucleotide substitution-rate matrices and transition probabilities.
//!
//! A model is a 4x4 rate matrix Q (rows indexed T, C, A, G, matching the
//! equilibrium-frequency order) plus the frequencies themselves. The named
//! constructors cover the standard reversible family (JC69 through GTR, all
//! delegating to TN93 where possible); an arbitrary non-reversible (UNREST)
//! matrix goes through [`SubstitutionMatrix::from_rates`].
//!
//! The indel rate xi is folded into the diagonal, so a base's total outgoing
//! rate `-q[i][i]` covers substitutions and indels together.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::base::Nucleotide;
use crate::errors::RateModelError;

/// Terms kept in the truncated power series for exp(Qt) when Q has no usable
/// eigendecomposition.
const SERIES_TERMS: usize = 30;

/// Tolerance for row sums, reversibility checks and clamping.
const TOL: f64 = 1e-8;

/// A validated substitution-rate matrix with its equilibrium frequencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutionMatrix {
    q: Matrix4<f64>,
    pi: [f64; 4],
}

impl SubstitutionMatrix {
    /// Build from an explicit rate matrix and equilibrium frequencies.
    ///
    /// Off-diagonal entries must be non-negative and each row must sum to
    /// <= 0 (the diagonal may absorb extra indel mass). This is the entry
    /// point for non-reversible (UNREST) models; transition probabilities
    /// for such a matrix fall back to a truncated power series.
    pub fn from_rates(q: Matrix4<f64>, pi: [f64; 4]) -> Result<Self, RateModelError> {
        let pi_sum: f64 = pi.iter().sum();
        if pi.iter().any(|&p| !(0.0..=1.0).contains(&p)) || (pi_sum - 1.0).abs() > 1e-6 {
            return Err(RateModelError::BadFrequencies { sum: pi_sum });
        }
        for i in 0..4 {
            let mut row_sum = 0.0;
            for j in 0..4 {
                if i != j && q[(i, j)] < 0.0 {
                    return Err(RateModelError::NegativeRate {
                        row: i,
                        col: j,
                        value: q[(i, j)],
                    });
                }
                row_sum += q[(i, j)];
            }
            if row_sum > TOL {
                return Err(RateModelError::RowSum { row: i, sum: row_sum });
            }
        }
        Ok(Self { q, pi })
    }

    /// The TN93 model: separate transition rates for pyrimidines
    /// (`alpha_1`: T<->C) and purines (`alpha_2`: A<->G), transversion rate
    /// `beta`, and total indel rate `xi` folded into the diagonal.
    pub fn tn93(
        pi: [f64; 4],
        alpha_1: f64,
        alpha_2: f64,
        beta: f64,
        xi: f64,
    ) -> Result<Self, RateModelError> {
        for (name, value) in [
            ("alpha_1", alpha_1),
            ("alpha_2", alpha_2),
            ("beta", beta),
            ("xi", xi),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RateModelError::InvalidParameter(name, value));
            }
        }

        let (t, c, a, g) = (0, 1, 2, 3);
        let mut q = Matrix4::zeros();
        q[(t, c)] = alpha_1 * pi[c];
        q[(c, t)] = alpha_1 * pi[t];
        q[(a, g)] = alpha_2 * pi[g];
        q[(g, a)] = alpha_2 * pi[a];
        for (i, j) in [
            (t, a),
            (t, g),
            (c, a),
            (c, g),
            (a, t),
            (a, c),
            (g, t),
            (g, c),
        ] {
            q[(i, j)] = beta * pi[j];
        }
        for i in 0..4 {
            let row_sum: f64 = (0..4).filter(|&j| j != i).map(|j| q[(i, j)]).sum();
            q[(i, i)] = -(row_sum + xi);
        }

        Self::from_rates(q, pi)
    }

    /// JC69: equal frequencies, one rate for everything.
    pub fn jc69(lambda: f64, xi: f64) -> Result<Self, RateModelError> {
        Self::tn93([0.25; 4], lambda, lambda, lambda, xi)
    }

    /// K80: equal frequencies, transitions `alpha`, transversions `beta`.
    pub fn k80(alpha: f64, beta: f64, xi: f64) -> Result<Self, RateModelError> {
        Self::tn93([0.25; 4], alpha, alpha, beta, xi)
    }

    /// F81: arbitrary frequencies, one exchangeability.
    pub fn f81(pi: [f64; 4], xi: f64) -> Result<Self, RateModelError> {
        Self::tn93(pi, 1.0, 1.0, 1.0, xi)
    }

    /// HKY85: arbitrary frequencies, transitions `alpha`, transversions
    /// `beta`.
    pub fn hky85(pi: [f64; 4], alpha: f64, beta: f64, xi: f64) -> Result<Self, RateModelError> {
        Self::tn93(pi, alpha, alpha, beta, xi)
    }

    /// GTR: arbitrary frequencies and six exchangeabilities in the pair
    /// order (T,C), (T,A), (T,G), (C,A), (C,G), (A,G).
    pub fn gtr(pi: [f64; 4], rates: [f64; 6], xi: f64) -> Result<Self, RateModelError> {
        for &r in &rates {
            if !r.is_finite() || r < 0.0 {
                return Err(RateModelError::InvalidParameter("gtr rate", r));
            }
        }
        let pairs = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
        let mut q = Matrix4::zeros();
        for (&(i, j), &r) in pairs.iter().zip(rates.iter()) {
            q[(i, j)] = r * pi[j];
            q[(j, i)] = r * pi[i];
        }
        for i in 0..4 {
            let row_sum: f64 = (0..4).filter(|&j| j != i).map(|j| q[(i, j)]).sum();
            q[(i, i)] = -(row_sum + xi);
        }
        Self::from_rates(q, pi)
    }

    /// The rate matrix.
    #[inline]
    pub fn q(&self) -> &Matrix4<f64> {
        &self.q
    }

    /// The equilibrium frequencies (pi_T, pi_C, pi_A, pi_G).
    #[inline]
    pub fn pi(&self) -> &[f64; 4] {
        &self.pi
    }

    /// Total outgoing rate of `base` (substitutions plus indels).
    #[inline]
    pub fn total_rate(&self, base: Nucleotide) -> f64 {
        -self.q[(base.to_index() as usize, base.to_index() as usize)]
    }

    /// The rate from one base to another.
    #[inline]
    pub fn rate(&self, from: Nucleotide, to: Nucleotide) -> f64 {
        self.q[(from.to_index() as usize, to.to_index() as usize)]
    }

    /// Whether the model satisfies detailed balance (pi_i q_ij == pi_j q_ji)
    /// with strictly positive frequencies.
    pub fn is_reversible(&self) -> bool {
        if self.pi.iter().any(|&p| p <= 0.0) {
            return false;
        }
        for i in 0..4 {
            for j in (i + 1)..4 {
                if (self.pi[i] * self.q[(i, j)] - self.pi[j] * self.q[(j, i)]).abs() > TOL {
                    return false;
                }
            }
        }
        true
    }
}

/// Precomputed machinery for P(t) = exp(Qt).
///
/// Reversible matrices are symmetrized by sqrt(pi) and eigendecomposed once;
/// P(t) is then `U diag(exp(L t)) Ui`. Anything else (UNREST) uses a
/// truncated power series. Entries that round below zero are clamped and the
/// rows renormalized rather than treated as errors.
#[derive(Debug, Clone)]
pub enum PtSolver {
    Eigen {
        u: Matrix4<f64>,
        ui: Matrix4<f64>,
        l: Vector4<f64>,
    },
    Series {
        q: Matrix4<f64>,
    },
}

impl PtSolver {
    /// Choose the decomposition for a model.
    pub fn new(matrix: &SubstitutionMatrix) -> Self {
        if !matrix.is_reversible() {
            return Self::Series { q: *matrix.q() };
        }

        let d = Vector4::from_iterator(matrix.pi().iter().map(|&p| p.sqrt()));
        let d_mat = Matrix4::from_diagonal(&d);
        let d_inv = Matrix4::from_diagonal(&d.map(|x| 1.0 / x));

        let mut b = d_mat * matrix.q() * d_inv;
        // Force exact symmetry before the symmetric eigensolver.
        b = (b + b.transpose()) * 0.5;

        let eigen = b.symmetric_eigen();
        Self::Eigen {
            u: d_inv * eigen.eigenvectors,
            ui: eigen.eigenvectors.transpose() * d_mat,
            l: eigen.eigenvalues,
        }
    }

    /// Transition probabilities after time `t`, rows summing to 1.
    pub fn probabilities(&self, t: f64) -> Matrix4<f64> {
        let mut p = match self {
            Self::Eigen { u, ui, l } => {
                let e = Matrix4::from_diagonal(&l.map(|x| (x * t).exp()));
                u * e * ui
            }
            Self::Series { q } => {
                let qt = q * t;
                let mut sum = Matrix4::identity();
                let mut term = Matrix4::identity();
                for k in 1..=SERIES_TERMS {
                    term = term * qt / k as f64;
                    sum += term;
                }
                sum
            }
        };

        for i in 0..4 {
            let mut row_sum = 0.0;
            for j in 0..4 {
                if p[(i, j)] < 0.0 {
                    p[(i, j)] = 0.0;
                }
                row_sum += p[(i, j)];
            }
            if row_sum > 0.0 {
                for j in 0..4 {
                    p[(i, j)] /= row_sum;
                }
            } else {
                p[(i, i)] = 1.0;
            }
        }
        p
    }
}
