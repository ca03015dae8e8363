//! Alias sampling from...
//! Walker, A. J. 1979. New fast method for generating discrete random numbers
//! with arbitrary frequency distributions. Electronics Letters 10.

use rand::Rng;

use crate::errors::SamplerError;

/// Near-unity tolerance: scaled probabilities within this distance of 1 are
/// treated as exactly 1 during the underfull/overfull sweep.
const EPS: f64 = 1e-8;

/// O(1) sampler over a fixed discrete distribution using Walker's alias
/// method.
///
/// Holds two length-n arrays: a cutoff `F[k]` and an alias `L[k]`. A single
/// uniform draw `u` picks a slot `k = floor(n*u)` and the leftover fraction
/// decides between `k` and its alias.
#[derive(Debug, Clone)]
pub struct AliasSampler {
    f: Vec<f64>,
    l: Vec<u32>,
}

impl AliasSampler {
    /// Build a sampler from non-negative weights (they need not sum to 1).
    pub fn new(weights: &[f64]) -> Result<Self, SamplerError> {
        for &w in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(SamplerError::InvalidWeight(w));
            }
        }
        let sum: f64 = weights.iter().sum();
        if weights.is_empty() || sum <= 0.0 {
            return Err(SamplerError::EmptyWeights);
        }

        let n = weights.len();
        let mut f: Vec<f64> = weights.iter().map(|&w| w / sum * n as f64).collect();
        let mut l: Vec<u32> = (0..n as u32).collect();

        // Indices with scaled probability below / above 1.
        let mut small: Vec<usize> = Vec::new();
        let mut large: Vec<usize> = Vec::new();
        for (i, &p) in f.iter().enumerate() {
            if (p - 1.0).abs() < EPS {
                continue;
            } else if p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while let (Some(&s), Some(&g)) = (small.last(), large.last()) {
            small.pop();
            // The underfull slot `s` is topped up from the overfull `g`.
            l[s] = g as u32;
            f[g] -= 1.0 - f[s];
            if (f[g] - 1.0).abs() < EPS {
                large.pop();
            } else if f[g] < 1.0 {
                large.pop();
                small.push(g);
            }
        }

        // Anything left over is within tolerance of 1.
        for &i in small.iter().chain(large.iter()) {
            f[i] = 1.0;
        }

        Ok(Self { f, l })
    }

    /// Draw a category index with one uniform draw.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let n = self.f.len();
        let u: f64 = rng.random::<f64>() * n as f64;
        let k = (u as usize).min(n - 1);
        let r = u - k as f64;
        if r < self.f[k] {
            k
        } else {
            self.l[k] as usize
        }
    }
}
