//! Table sampling from...
//! Marsaglia, G., W. W. Tsang, and J. Wang. 2004. Fast generation of discrete
//! random variables. Journal of Statistical Software 11.

use rand::Rng;

use crate::errors::SamplerError;

/// O(1) sampler over a fixed discrete distribution using the four-table
/// condensed method.
///
/// Probabilities are converted to integer counts summing to exactly 2^32;
/// table `k` holds, for each category, as many copies of its index as the
/// k-th base-256 digit of its count. A single 32-bit draw then selects the
/// table by cumulative thresholds and indexes into it.
///
/// Construction consumes randomness (to spread rounding deficits across
/// categories in proportion to their probabilities), so the whole sampler is
/// deterministic given the PRNG.
#[derive(Debug, Clone)]
pub struct TableSampler {
    tables: [Vec<u32>; 4],
    thresholds: [u64; 3],
    /// Set when only one category has positive weight; a count of 2^32 has
    /// no 8-bit digit representation.
    single: Option<u32>,
}

impl TableSampler {
    /// Build a sampler from non-negative weights (they need not sum to 1).
    pub fn new<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<Self, SamplerError> {
        for &w in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(SamplerError::InvalidWeight(w));
            }
        }
        let sum: f64 = weights.iter().sum();
        if weights.is_empty() || sum <= 0.0 {
            return Err(SamplerError::EmptyWeights);
        }

        let positive = weights.iter().filter(|&&w| w > 0.0).count();
        if positive == 1 {
            let index = weights.iter().position(|&w| w > 0.0).map(|i| i as u32);
            return Ok(Self {
                tables: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
                thresholds: [0; 3],
                single: index,
            });
        }

        let ints = fill_ints(weights, sum, rng);

        // Sizes of the four tables from the base-256 digits of each count.
        let mut sizes = [0usize; 4];
        for &count in &ints {
            for (k, size) in sizes.iter_mut().enumerate() {
                *size += digit(count, k) as usize;
            }
        }

        // Cumulative thresholds for selecting a table from a 32-bit draw.
        let mut thresholds = [0u64; 3];
        for k in 0..3 {
            thresholds[k] = (sizes[k] as u64) << (32 - 8 * (k + 1));
            if k > 0 {
                thresholds[k] += thresholds[k - 1];
            }
        }

        let mut tables = [
            Vec::with_capacity(sizes[0]),
            Vec::with_capacity(sizes[1]),
            Vec::with_capacity(sizes[2]),
            Vec::with_capacity(sizes[3]),
        ];
        for (k, table) in tables.iter_mut().enumerate() {
            for (i, &count) in ints.iter().enumerate() {
                let copies = digit(count, k);
                for _ in 0..copies {
                    table.push(i as u32);
                }
            }
        }

        Ok(Self {
            tables,
            thresholds,
            single: None,
        })
    }

    /// Draw a category index with one 32-bit uniform draw.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if let Some(single) = self.single {
            return single as usize;
        }
        let j = rng.next_u32() as u64;
        let [t0, t1, t2] = self.thresholds;
        if j < t0 {
            self.tables[0][(j >> 24) as usize] as usize
        } else if j < t1 {
            self.tables[1][((j - t0) >> 16) as usize] as usize
        } else if j < t2 {
            self.tables[2][((j - t1) >> 8) as usize] as usize
        } else {
            self.tables[3][(j - t2) as usize] as usize
        }
    }
}

/// The k-th (0-based) base-256 digit of a count, from the most significant.
#[inline(always)]
fn digit(count: u64, k: usize) -> u64 {
    (count >> (32 - 8 * (k + 1))) & 0xFF
}

/// Convert weights to integer counts summing to exactly 2^32.
///
/// Counts are first rounded from `w / sum * 2^32`; the rounding deficit or
/// surplus is then resolved one unit at a time, choosing which category to
/// adjust by sampling from the weights themselves so that large categories
/// absorb most of the correction. Categories rarer than a moving threshold
/// (2^-8, lowered while it would exclude everything) are never adjusted.
fn fill_ints<R: Rng + ?Sized>(weights: &[f64], sum: f64, rng: &mut R) -> Vec<u64> {
    const TWO32: f64 = 4_294_967_296.0;

    let mut ints: Vec<u64> = weights
        .iter()
        .map(|&w| (w / sum * TWO32).round() as u64)
        .collect();

    let total: u64 = ints.iter().sum();
    let mut deficit = (1i64 << 32) - total as i64;

    // Cumulative distribution for picking adjustment targets.
    let mut adjust: Vec<f64> = weights.iter().map(|&w| w / sum).collect();
    let mut z = 1.0 / 256.0;
    while adjust.iter().all(|&p| p < z) {
        z /= 256.0;
    }
    for p in adjust.iter_mut() {
        if *p < z {
            *p = 0.0;
        }
    }
    let adjust_sum: f64 = adjust.iter().sum();
    let mut cum = 0.0;
    for p in adjust.iter_mut() {
        cum += *p / adjust_sum;
        *p = cum;
    }

    while deficit != 0 {
        let u: f64 = rng.random();
        let i = adjust.partition_point(|&c| c < u).min(adjust.len() - 1);
        if deficit < 0 {
            if ints[i] > 0 {
                ints[i] -= 1;
                deficit += 1;
            }
        } else {
            ints[i] += 1;
            deficit -= 1;
        }
    }

    ints
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn observed_freqs(sampler: &TableSampler, n_cats: usize, draws: usize) -> Vec<f64> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(101);
        let mut counts = vec![0usize; n_cats];
        for _ in 0..draws {
            counts[sampler.sample(&mut rng)] += 1;
        }
        counts.iter().map(|&c| c as f64 / draws as f64).collect()
    }

    #[test]
    fn test_counts_sum_to_two_pow_32() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let weights = [0.1, 0.2, 0.3, 0.4];
        let sum: f64 = weights.iter().sum();
        let ints = fill_ints(&weights, sum, &mut rng);
        assert_eq!(ints.iter().sum::<u64>(), 1u64 << 32);
    }

    #[test]
    fn test_rejects_bad_weights() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        assert!(TableSampler::new(&[], &mut rng).is_err());
        assert!(TableSampler::new(&[0.0, 0.0], &mut rng).is_err());
        assert!(TableSampler::new(&[0.5, -0.1], &mut rng).is_err());
        assert!(TableSampler::new(&[0.5, f64::NAN], &mut rng).is_err());
    }

    #[test]
    fn test_single_category() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let sampler = TableSampler::new(&[0.0, 1.0, 0.0], &mut rng).unwrap();
        for _ in 0..100 {
            assert_eq!(sampler.sample(&mut rng), 1);
        }
    }

    #[test]
    fn test_zero_weight_never_sampled() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let sampler = TableSampler::new(&[0.5, 0.0, 0.5], &mut rng).unwrap();
        for _ in 0..10_000 {
            assert_ne!(sampler.sample(&mut rng), 1);
        }
    }

    #[test]
    fn test_convergence_to_weights() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let weights = [0.05, 0.15, 0.3, 0.5];
        let sampler = TableSampler::new(&weights, &mut rng).unwrap();

        let freqs = observed_freqs(&sampler, weights.len(), 200_000);
        let tv: f64 = weights
            .iter()
            .zip(&freqs)
            .map(|(w, f)| (w - f).abs())
            .sum::<f64>()
            / 2.0;
        assert!(tv < 0.01, "total variation too large: {tv}");
    }

    #[test]
    fn test_unnormalized_weights() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let sampler = TableSampler::new(&[2.0, 6.0], &mut rng).unwrap();
        let freqs = observed_freqs(&sampler, 2, 100_000);
        assert!((freqs[0] - 0.25).abs() < 0.01);
        assert!((freqs[1] - 0.75).abs() < 0.01);
    }

    #[test]
    fn test_deterministic_given_prng() {
        let weights = [0.1, 0.6, 0.3];
        let mut rng1 = Xoshiro256PlusPlus::seed_from_u64(9);
        let mut rng2 = Xoshiro256PlusPlus::seed_from_u64(9);
        let s1 = TableSampler::new(&weights, &mut rng1).unwrap();
        let s2 = TableSampler::new(&weights, &mut rng2).unwrap();
        for _ in 0..1000 {
            assert_eq!(s1.sample(&mut rng1), s2.sample(&mut rng2));
        }
    }

    #[test]
    fn test_rare_category_reachable() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let weights = [0.999, 0.001];
        let sampler = TableSampler::new(&weights, &mut rng).unwrap();
        let freqs = observed_freqs(&sampler, 2, 1_000_000);
        assert!(freqs[1] > 0.0);
        assert!((freqs[1] - 0.001).abs() < 0.0005);
    }
}
