//! Dataset abstractions and index-view combinators.
//!
//! This module defines the [`LabeledDataset`] trait plus the combinators the
//! pipeline composes:
//!
//! - [`ConcatDataset`]: flat, order-preserving concatenation of per-file
//!   datasets into one globally indexed dataset.
//! - [`SubsetDataset`]: a view over selected indices (one per partition).
//! - [`VecDataset`]: in-memory samples, for small fixtures and tests.
//!
//! Datasets are shared through [`SharedDataset`] (`Arc<dyn LabeledDataset>`),
//! so wrapping one never copies or mutates the layer beneath it.
//!
//! # Example
//!
//! ```rust
//! use bearing_data::dataset::{ConcatDataset, LabeledDataset, Sample, SharedDataset, VecDataset};
//! use ndarray::Array3;
//! use std::sync::Arc;
//!
//! let a: SharedDataset = Arc::new(VecDataset::new(vec![Sample::new(Array3::zeros((1, 2, 2)), 0)]));
//! let b: SharedDataset = Arc::new(VecDataset::new(vec![Sample::new(Array3::ones((1, 2, 2)), 1); 2]));
//! let all = ConcatDataset::new(vec![a, b]);
//!
//! assert_eq!(all.len(), 3);
//! assert_eq!(all.get(2).unwrap().target, 1);
//! ```

use ndarray::Array3;
use std::sync::Arc;

use crate::error::DatasetError;

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One spectrogram image paired with its encoded class.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Image tensor.
    ///
    /// Shape: `[channels, height, width]` (one channel for spectrograms).
    pub image: Array3<f32>,

    /// Integer-encoded class label.
    pub target: usize,
}

impl Sample {
    /// Pair an image with its target.
    pub fn new(image: Array3<f32>, target: usize) -> Self {
        Sample { image, target }
    }
}

// ---------------------------------------------------------------------------
// LabeledDataset trait
// ---------------------------------------------------------------------------

/// Common interface for every index-addressable `(image, label)` dataset.
///
/// Implementations must be `Send + Sync` and must not keep mutable state
/// between calls: loader workers call [`get`](LabeledDataset::get)
/// concurrently.
pub trait LabeledDataset: Send + Sync {
    /// Total number of samples in this dataset.
    fn len(&self) -> usize;

    /// Load the sample at position `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::IndexOutOfBounds`] when `idx >= self.len()` and
    /// source-specific errors for I/O or format problems.
    fn get(&self, idx: usize) -> Result<Sample, DatasetError>;

    /// Returns `true` when the dataset contains no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Shared, immutable handle to a dataset layer.
pub type SharedDataset = Arc<dyn LabeledDataset>;

// ---------------------------------------------------------------------------
// ConcatDataset
// ---------------------------------------------------------------------------

/// Concatenates datasets end-to-end, preserving order.
///
/// Empty members are allowed and simply contribute no indices.
pub struct ConcatDataset {
    datasets: Vec<SharedDataset>,
    /// Prefix sums of member lengths (length = datasets.len() + 1).
    cumulative: Vec<usize>,
}

impl ConcatDataset {
    /// Concatenate `datasets` in the given order.
    pub fn new(datasets: Vec<SharedDataset>) -> Self {
        let mut cumulative = vec![0usize; datasets.len() + 1];
        for (i, ds) in datasets.iter().enumerate() {
            cumulative[i + 1] = cumulative[i] + ds.len();
        }
        ConcatDataset { datasets, cumulative }
    }

    /// Number of member datasets, including empty ones.
    pub fn num_members(&self) -> usize {
        self.datasets.len()
    }

    /// Resolve a global index to `(member_index, local_index)`.
    pub fn locate(&self, idx: usize) -> Option<(usize, usize)> {
        if idx >= self.len() {
            return None;
        }
        // Last prefix sum <= idx; skips empty members automatically.
        let member = self.cumulative.partition_point(|&c| c <= idx) - 1;
        Some((member, idx - self.cumulative[member]))
    }
}

impl LabeledDataset for ConcatDataset {
    fn len(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0)
    }

    fn get(&self, idx: usize) -> Result<Sample, DatasetError> {
        let (member, local) = self
            .locate(idx)
            .ok_or(DatasetError::IndexOutOfBounds { idx, len: self.len() })?;
        self.datasets[member].get(local)
    }

    fn name(&self) -> &str {
        "ConcatDataset"
    }
}

// ---------------------------------------------------------------------------
// SubsetDataset
// ---------------------------------------------------------------------------

/// A dataset that exposes only the samples at the given indices.
pub struct SubsetDataset {
    inner: SharedDataset,
    indices: Vec<usize>,
}

impl SubsetDataset {
    /// View `inner` through `indices`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::IndexOutOfBounds`] for the first index that is
    /// not valid in `inner`.
    pub fn new(inner: SharedDataset, indices: Vec<usize>) -> Result<Self, DatasetError> {
        let len = inner.len();
        if let Some(&idx) = indices.iter().find(|&&i| i >= len) {
            return Err(DatasetError::IndexOutOfBounds { idx, len });
        }
        Ok(SubsetDataset { inner, indices })
    }

    /// Indices into the wrapped dataset, in subset order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl LabeledDataset for SubsetDataset {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, idx: usize) -> Result<Sample, DatasetError> {
        let inner_idx = *self
            .indices
            .get(idx)
            .ok_or(DatasetError::IndexOutOfBounds { idx, len: self.indices.len() })?;
        self.inner.get(inner_idx)
    }

    fn name(&self) -> &str {
        "SubsetDataset"
    }
}

// ---------------------------------------------------------------------------
// VecDataset
// ---------------------------------------------------------------------------

/// In-memory dataset backed by a `Vec<Sample>`.
#[derive(Debug, Clone, Default)]
pub struct VecDataset {
    samples: Vec<Sample>,
}

impl VecDataset {
    /// Wrap precomputed samples.
    pub fn new(samples: Vec<Sample>) -> Self {
        VecDataset { samples }
    }

    /// One single-pixel image per value, all with `target`.
    pub fn from_pixels(values: &[f32], target: usize) -> Self {
        let samples = values
            .iter()
            .map(|&v| Sample::new(Array3::from_elem((1, 1, 1), v), target))
            .collect();
        VecDataset { samples }
    }
}

impl LabeledDataset for VecDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, idx: usize) -> Result<Sample, DatasetError> {
        self.samples
            .get(idx)
            .cloned()
            .ok_or(DatasetError::IndexOutOfBounds { idx, len: self.samples.len() })
    }

    fn name(&self) -> &str {
        "VecDataset"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(values: &[f32], target: usize) -> SharedDataset {
        Arc::new(VecDataset::from_pixels(values, target))
    }

    fn value(sample: &Sample) -> f32 {
        sample.image[[0, 0, 0]]
    }

    #[test]
    fn concat_preserves_order() {
        let concat = ConcatDataset::new(vec![pixels(&[0.0, 1.0, 2.0], 0), pixels(&[10.0, 11.0], 1)]);
        assert_eq!(concat.len(), 5);
        let values: Vec<f32> = (0..5).map(|i| value(&concat.get(i).unwrap())).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 10.0, 11.0]);
        assert_eq!(concat.get(3).unwrap().target, 1);
    }

    #[test]
    fn concat_skips_empty_members() {
        let concat = ConcatDataset::new(vec![
            pixels(&[], 0),
            pixels(&[1.0, 2.0], 1),
            pixels(&[], 2),
            pixels(&[3.0], 3),
            pixels(&[], 4),
        ]);
        assert_eq!(concat.len(), 3);
        assert_eq!(concat.num_members(), 5);
        assert_eq!(concat.locate(0), Some((1, 0)));
        assert_eq!(concat.locate(1), Some((1, 1)));
        assert_eq!(concat.locate(2), Some((3, 0)));
        assert_eq!(concat.get(2).unwrap().target, 3);
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        let concat = ConcatDataset::new(Vec::new());
        assert!(concat.is_empty());
        assert!(matches!(
            concat.get(0),
            Err(DatasetError::IndexOutOfBounds { idx: 0, len: 0 })
        ));
    }

    #[test]
    fn subset_maps_indices() {
        let sub = SubsetDataset::new(pixels(&[0.0, 1.0, 2.0, 3.0, 4.0], 0), vec![4, 0, 2]).unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(value(&sub.get(0).unwrap()), 4.0);
        assert_eq!(value(&sub.get(1).unwrap()), 0.0);
        assert_eq!(value(&sub.get(2).unwrap()), 2.0);
        assert!(matches!(
            sub.get(3),
            Err(DatasetError::IndexOutOfBounds { idx: 3, len: 3 })
        ));
    }

    #[test]
    fn subset_rejects_invalid_indices() {
        assert!(matches!(
            SubsetDataset::new(pixels(&[0.0, 1.0], 0), vec![0, 2]),
            Err(DatasetError::IndexOutOfBounds { idx: 2, len: 2 })
        ));
    }

    #[test]
    fn vec_dataset_out_of_bounds() {
        let ds = VecDataset::from_pixels(&[1.0], 0);
        assert!(ds.get(0).is_ok());
        assert!(matches!(
            ds.get(1),
            Err(DatasetError::IndexOutOfBounds { idx: 1, len: 1 })
        ));
    }
}
