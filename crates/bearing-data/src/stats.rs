//! Streaming dataset statistics.
//!
//! Statistics are computed by iterating a [`DataLoader`] batch by batch, so
//! the dataset is never held in memory at once. Each batch contributes an
//! `f64` partial (sum, count, min or max) and partials are combined across
//! batches with Neumaier compensated summation; the result does not depend
//! on how samples are grouped into batches.
//!
//! Passes always use [`DataLoader::iter_ordered`], so the two passes of
//! [`compute_mean_std`] see identical contents even on a shuffling loader.

use tracing::debug;

use crate::error::StatsError;
use crate::loader::DataLoader;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Mean and population standard deviation of every pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    /// Pixel mean.
    pub mean: f64,
    /// Population standard deviation, `sqrt(sum((x - mean)^2) / n)`.
    pub std: f64,
}

/// Extremes of every pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    /// Smallest pixel value.
    pub min: f64,
    /// Largest pixel value.
    pub max: f64,
}

impl MinMax {
    /// Centre of the range, `(max + min) / 2`.
    pub fn midpoint(&self) -> f64 {
        (self.max + self.min) / 2.0
    }

    /// Half-width of the range, `(max - min) / 2`.
    pub fn half_range(&self) -> f64 {
        (self.max - self.min) / 2.0
    }
}

// ---------------------------------------------------------------------------
// Compensated accumulation
// ---------------------------------------------------------------------------

/// Neumaier (improved Kahan-Babuska) running sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    /// Empty sum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one term.
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    /// Current total.
    pub fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Mean and population standard deviation over every pixel the loader
/// yields, in two passes.
///
/// # Errors
///
/// [`StatsError::EmptyLoader`] if the loader yields no pixels and
/// [`StatsError::Dataset`] if a batch fails to load.
pub fn compute_mean_std(loader: &DataLoader) -> Result<MeanStd, StatsError> {
    let mut sum = CompensatedSum::new();
    let mut count: u64 = 0;
    for batch in loader.iter_ordered() {
        let batch = batch?;
        sum.add(batch.images.iter().map(|&v| f64::from(v)).sum());
        count += batch.images.len() as u64;
    }
    if count == 0 {
        return Err(StatsError::EmptyLoader);
    }
    let mean = sum.total() / count as f64;

    let mut ssd = CompensatedSum::new();
    for batch in loader.iter_ordered() {
        let batch = batch?;
        ssd.add(
            batch
                .images
                .iter()
                .map(|&v| {
                    let d = f64::from(v) - mean;
                    d * d
                })
                .sum(),
        );
    }
    let std = (ssd.total() / count as f64).sqrt();

    debug!("mean/std over {count} pixels: mean={mean:.6}, std={std:.6}");
    Ok(MeanStd { mean, std })
}

/// Minimum and maximum over every pixel the loader yields, in one pass.
///
/// # Errors
///
/// [`StatsError::EmptyLoader`] if the loader yields no pixels and
/// [`StatsError::Dataset`] if a batch fails to load.
pub fn compute_min_max(loader: &DataLoader) -> Result<MinMax, StatsError> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut count: u64 = 0;
    for batch in loader.iter_ordered() {
        let batch = batch?;
        for &v in batch.images.iter() {
            let v = f64::from(v);
            min = min.min(v);
            max = max.max(v);
        }
        count += batch.images.len() as u64;
    }
    if count == 0 {
        return Err(StatsError::EmptyLoader);
    }

    debug!("min/max over {count} pixels: min={min:.6}, max={max:.6}");
    Ok(MinMax { min, max })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{SharedDataset, VecDataset};
    use crate::loader::LoaderOptions;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn loader(values: &[f32], batch_size: usize) -> DataLoader {
        let ds: SharedDataset = Arc::new(VecDataset::from_pixels(values, 0));
        DataLoader::new(ds, LoaderOptions::new(batch_size)).unwrap()
    }

    #[test]
    fn mean_std_of_two_batches() {
        // Batches [1, 2, 3] and [4, 5].
        let stats = compute_mean_std(&loader(&[1.0, 2.0, 3.0, 4.0, 5.0], 3)).unwrap();
        assert_abs_diff_eq!(stats.mean, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.std, 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn mean_std_is_batching_invariant() {
        let values: Vec<f32> = (0..97).map(|i| ((i * 37) % 101) as f32 * 0.25 - 7.0).collect();
        let reference = compute_mean_std(&loader(&values, values.len())).unwrap();
        for batch_size in [1, 2, 5, 16, 96] {
            let stats = compute_mean_std(&loader(&values, batch_size)).unwrap();
            assert_abs_diff_eq!(stats.mean, reference.mean, epsilon = 1e-9);
            assert_abs_diff_eq!(stats.std, reference.std, epsilon = 1e-9);
        }
    }

    #[test]
    fn min_max_is_order_and_batch_invariant() {
        let values = [3.0, -8.5, 12.25, 0.0, 4.0, -1.0, 7.5];
        let mut reversed = values;
        reversed.reverse();
        for batch_size in [1, 3, 7] {
            for v in [&values[..], &reversed[..]] {
                let mm = compute_min_max(&loader(v, batch_size)).unwrap();
                assert_eq!(mm.min, -8.5);
                assert_eq!(mm.max, 12.25);
            }
        }
    }

    #[test]
    fn shuffling_loader_gives_same_stats() {
        let values: Vec<f32> = (0..40).map(|i| i as f32).collect();
        let ds: SharedDataset = Arc::new(VecDataset::from_pixels(&values, 0));
        let shuffled = DataLoader::new(ds, LoaderOptions::new(7).shuffle(true).seed(5)).unwrap();
        let plain = loader(&values, 7);
        assert_eq!(compute_mean_std(&shuffled).unwrap(), compute_mean_std(&plain).unwrap());
    }

    #[test]
    fn empty_loader_is_error() {
        assert!(matches!(compute_mean_std(&loader(&[], 4)), Err(StatsError::EmptyLoader)));
        assert!(matches!(compute_min_max(&loader(&[], 4)), Err(StatsError::EmptyLoader)));
    }

    #[test]
    fn min_max_helpers() {
        let mm = MinMax { min: -3.0, max: 5.0 };
        assert_eq!(mm.midpoint(), 1.0);
        assert_eq!(mm.half_range(), 4.0);
    }

    #[test]
    fn compensated_sum_recovers_small_terms() {
        let mut sum = CompensatedSum::new();
        sum.add(1.0);
        sum.add(1e100);
        sum.add(1.0);
        sum.add(-1e100);
        assert_eq!(sum.total(), 2.0);
    }
}
