//! Site-rate heterogeneity.
//!
//! Each chromosome carries a list of `(end, multiplier)` regions covering it
//! in disjoint increasing ranges; a site's mutation rate is scaled by its
//! region's multiplier. Regions are either supplied by the caller (and
//! validated here) or drawn from a Gamma(shape, shape) distribution in
//! fixed-size tiles, normalized so the sequence-size-weighted mean across
//! the whole genome is exactly 1.

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::errors::GammaError;

/// Per-chromosome site-rate regions: `ends[i]` is the exclusive end of
/// region `i`, `values[i]` its rate multiplier. The last end equals the
/// chromosome size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaRegions {
    ends: Vec<usize>,
    values: Vec<f64>,
}

impl GammaRegions {
    /// Build from explicit columns, applying the full validation set:
    /// matching column lengths, positive strictly-increasing end points,
    /// non-negative multipliers, and a final end point equal to the
    /// chromosome size.
    pub fn new(ends: Vec<usize>, values: Vec<f64>, seq_size: usize) -> Result<Self, GammaError> {
        if ends.len() != values.len() {
            return Err(GammaError::ColumnMismatch {
                ends: ends.len(),
                values: values.len(),
            });
        }
        if ends.is_empty() {
            return Err(GammaError::EmptyRegions);
        }
        let mut prev = 0usize;
        for (i, &end) in ends.iter().enumerate() {
            if end <= prev {
                return Err(GammaError::NonIncreasingEnds { index: i });
            }
            prev = end;
        }
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() || v < 0.0 {
                return Err(GammaError::NegativeWeight { index: i, value: v });
            }
        }
        let last = ends[ends.len() - 1];
        if last != seq_size {
            return Err(GammaError::LastEndMismatch { last, seq_size });
        }
        Ok(Self { ends, values })
    }

    /// A single all-covering region with multiplier 1 (no heterogeneity).
    pub fn uniform(seq_size: usize) -> Self {
        Self {
            ends: vec![seq_size],
            values: vec![1.0],
        }
    }

    /// Number of regions.
    #[inline]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// Always false: construction rejects empty region lists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// The chromosome size these regions cover.
    #[inline]
    pub fn seq_size(&self) -> usize {
        self.ends[self.ends.len() - 1]
    }

    /// The region multipliers.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The exclusive region end points.
    #[inline]
    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    /// Index of the region containing reference position `pos`.
    #[inline]
    pub fn region_at(&self, pos: usize) -> usize {
        self.ends.partition_point(|&e| e <= pos)
    }

    /// Multiplier at reference position `pos`.
    #[inline]
    pub fn value_at(&self, pos: usize) -> f64 {
        self.values[self.region_at(pos)]
    }
}

/// Draw site-rate regions for every chromosome.
///
/// With `shape <= 0` every chromosome gets a single region of multiplier 1.
/// Otherwise each chromosome is tiled in `gamma_size` regions whose
/// multipliers come from Gamma(shape, shape); afterwards every multiplier is
/// divided by the sequence-size-weighted mean so the genome-wide mean is
/// exactly 1.
pub fn make_gamma_regions<R: Rng + ?Sized>(
    seq_sizes: &[usize],
    gamma_size: usize,
    shape: f64,
    rng: &mut R,
) -> Result<Vec<GammaRegions>, GammaError> {
    if gamma_size == 0 {
        return Err(GammaError::ZeroRegionSize);
    }

    if shape <= 0.0 {
        return Ok(seq_sizes.iter().map(|&n| GammaRegions::uniform(n)).collect());
    }

    // Gamma(shape, rate = shape), i.e. scale 1/shape, mean 1.
    let distr = match Gamma::new(shape, 1.0 / shape) {
        Ok(d) => d,
        Err(_) => return Err(GammaError::ZeroRegionSize),
    };

    let total_size: usize = seq_sizes.iter().sum();
    let mut values_x_sizes = 0.0;

    let mut all: Vec<GammaRegions> = Vec::with_capacity(seq_sizes.len());
    for &seq_size in seq_sizes {
        let n_regions = seq_size.div_ceil(gamma_size).max(1);
        let mut ends = Vec::with_capacity(n_regions);
        let mut values = Vec::with_capacity(n_regions);
        for i in 0..n_regions {
            let end = if i == n_regions - 1 {
                seq_size
            } else {
                (i + 1) * gamma_size
            };
            let value = distr.sample(rng);
            let start = i * gamma_size;
            values_x_sizes += (end - start) as f64 * value;
            ends.push(end);
            values.push(value);
        }
        all.push(GammaRegions { ends, values });
    }

    // Normalize so the weighted genome-wide mean is exactly 1.
    let mean = values_x_sizes / total_size as f64;
    if mean > 0.0 {
        for regions in &mut all {
            for v in &mut regions.values {
                *v /= mean;
            }
        }
    }

    Ok(all)
}

/// Validate caller-supplied regions against the chromosome sizes.
pub fn check_gamma_regions(
    regions: &[GammaRegions],
    seq_sizes: &[usize],
) -> Result<(), GammaError> {
    if regions.len() != seq_sizes.len() {
        return Err(GammaError::CountMismatch {
            regions: regions.len(),
            chroms: seq_sizes.len(),
        });
    }
    for (r, &n) in regions.iter().zip(seq_sizes) {
        // Re-run the constructor checks on the existing columns.
        GammaRegions::new(r.ends.clone(), r.values.clone(), n)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_validation_catches_bad_columns() {
        assert!(matches!(
            GammaRegions::new(vec![5, 10], vec![1.0], 10),
            Err(GammaError::ColumnMismatch { .. })
        ));
        assert!(matches!(
            GammaRegions::new(vec![], vec![], 10),
            Err(GammaError::EmptyRegions)
        ));
        assert!(matches!(
            GammaRegions::new(vec![5, 5], vec![1.0, 1.0], 5),
            Err(GammaError::NonIncreasingEnds { index: 1 })
        ));
        assert!(matches!(
            GammaRegions::new(vec![0, 5], vec![1.0, 1.0], 5),
            Err(GammaError::NonIncreasingEnds { index: 0 })
        ));
        assert!(matches!(
            GammaRegions::new(vec![5, 10], vec![1.0, -2.0], 10),
            Err(GammaError::NegativeWeight { .. })
        ));
        assert!(matches!(
            GammaRegions::new(vec![5, 9], vec![1.0, 1.0], 10),
            Err(GammaError::LastEndMismatch { .. })
        ));
    }

    #[test]
    fn test_value_lookup() {
        let regions = GammaRegions::new(vec![3, 7, 10], vec![0.5, 2.0, 1.0], 10).unwrap();
        assert_eq!(regions.value_at(0), 0.5);
        assert_eq!(regions.value_at(2), 0.5);
        assert_eq!(regions.value_at(3), 2.0);
        assert_eq!(regions.value_at(6), 2.0);
        assert_eq!(regions.value_at(7), 1.0);
        assert_eq!(regions.value_at(9), 1.0);
    }

    #[test]
    fn test_uniform_shape_zero() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let all = make_gamma_regions(&[100, 50], 10, 0.0, &mut rng).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].len(), 1);
        assert_eq!(all[0].value_at(99), 1.0);
        assert_eq!(all[1].seq_size(), 50);
    }

    #[test]
    fn test_tiling_covers_chromosome() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let all = make_gamma_regions(&[95], 10, 1.0, &mut rng).unwrap();
        let regions = &all[0];
        assert_eq!(regions.len(), 10);
        assert_eq!(regions.seq_size(), 95);
        // Last tile is the short one.
        assert_eq!(regions.ends()[8], 90);
        assert_eq!(regions.ends()[9], 95);
    }

    #[test]
    fn test_weighted_mean_is_one() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let sizes = [1000usize, 400, 250];
        let all = make_gamma_regions(&sizes, 25, 0.5, &mut rng).unwrap();

        let mut weighted = 0.0;
        for regions in &all {
            let mut start = 0;
            for (&end, &v) in regions.ends().iter().zip(regions.values()) {
                weighted += (end - start) as f64 * v;
                start = end;
            }
        }
        let total: usize = sizes.iter().sum();
        assert!((weighted / total as f64 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_region_size_rejected() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        assert!(matches!(
            make_gamma_regions(&[10], 0, 1.0, &mut rng),
            Err(GammaError::ZeroRegionSize)
        ));
    }

    #[test]
    fn test_check_gamma_regions() {
        let good = vec![GammaRegions::uniform(10), GammaRegions::uniform(20)];
        assert!(check_gamma_regions(&good, &[10, 20]).is_ok());
        assert!(matches!(
            check_gamma_regions(&good, &[10]),
            Err(GammaError::CountMismatch { .. })
        ));
        assert!(matches!(
            check_gamma_regions(&good, &[10, 25]),
            Err(GammaError::LastEndMismatch { .. })
        ));
    }
}
