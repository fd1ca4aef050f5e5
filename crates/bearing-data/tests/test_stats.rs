//! Integration tests for [`bearing_data::stats`].
//!
//! Datasets are built from fixed pixel values; the only shuffling uses fixed
//! seeds.

use approx::assert_abs_diff_eq;
use bearing_data::dataset::{LabeledDataset, Sample, SharedDataset, VecDataset};
use bearing_data::error::StatsError;
use bearing_data::loader::{worker_pool, DataLoader, LoaderOptions};
use bearing_data::stats::{compute_mean_std, compute_min_max};
use ndarray::Array3;
use std::sync::Arc;

/// Twenty-three 1×3×4 images with distinct, irregular pixel values.
fn images() -> SharedDataset {
    let samples = (0..23)
        .map(|i| {
            let image = Array3::from_shape_fn((1, 3, 4), |(_, r, c)| {
                let k = (i * 12 + r * 4 + c) as f32;
                (k * 0.731).sin() * 40.0 + k * 0.05
            });
            Sample::new(image, i % 3)
        })
        .collect();
    Arc::new(VecDataset::new(samples))
}

fn loader(batch_size: usize) -> DataLoader {
    DataLoader::new(images(), LoaderOptions::new(batch_size)).unwrap()
}

/// Direct two-pass reference over every pixel.
fn reference() -> (f64, f64, f64, f64) {
    let ds = images();
    let pixels: Vec<f64> = (0..ds.len())
        .flat_map(|i| ds.get(i).unwrap().image.iter().map(|&v| f64::from(v)).collect::<Vec<_>>())
        .collect();
    let n = pixels.len() as f64;
    let mean = pixels.iter().sum::<f64>() / n;
    let std = (pixels.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let min = pixels.iter().copied().fold(f64::INFINITY, f64::min);
    let max = pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (mean, std, min, max)
}

/// Mean and std agree with a direct computation for every batch size.
#[test]
fn mean_std_matches_reference_for_any_batching() {
    let (mean, std, _, _) = reference();
    for batch_size in [1, 4, 7, 23, 64] {
        let stats = compute_mean_std(&loader(batch_size)).unwrap();
        assert_abs_diff_eq!(stats.mean, mean, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.std, std, epsilon = 1e-9);
    }
}

/// Min and max agree with a direct computation for every batch size.
#[test]
fn min_max_matches_reference_for_any_batching() {
    let (_, _, min, max) = reference();
    for batch_size in [1, 5, 23] {
        let range = compute_min_max(&loader(batch_size)).unwrap();
        assert_eq!(range.min, min);
        assert_eq!(range.max, max);
    }
}

/// A shuffling, multi-threaded loader produces the same statistics.
#[test]
fn shuffled_parallel_loader_is_equivalent() {
    let plain = compute_mean_std(&loader(6)).unwrap();
    let fancy = DataLoader::new(images(), LoaderOptions::new(6).shuffle(true).seed(11))
        .unwrap()
        .with_workers(worker_pool(2).unwrap());
    let stats = compute_mean_std(&fancy).unwrap();
    assert_abs_diff_eq!(stats.mean, plain.mean, epsilon = 1e-12);
    assert_abs_diff_eq!(stats.std, plain.std, epsilon = 1e-12);
}

/// Zero pixels is an error, never NaN.
#[test]
fn empty_dataset_is_error() {
    let empty: SharedDataset = Arc::new(VecDataset::default());
    let dl = DataLoader::new(empty, LoaderOptions::new(8)).unwrap();
    assert!(matches!(compute_mean_std(&dl), Err(StatsError::EmptyLoader)));
    assert!(matches!(compute_min_max(&dl), Err(StatsError::EmptyLoader)));
}
