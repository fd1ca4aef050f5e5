//! Batched loading with optional seeded shuffle and parallel fetch.
//!
//! A [`DataLoader`] owns a shared handle to its dataset and yields
//! [`Batch`]es of stacked images. The last batch of an epoch may be smaller
//! than `batch_size`. When a worker pool is attached, the samples of each
//! batch are fetched in parallel on that pool; batch order and sample order
//! inside a batch are unaffected.
//!
//! Shuffled loaders draw a fresh permutation every epoch from a seed derived
//! from the loader seed and the epoch number, so two loaders built with the
//! same seed replay the same sequence of epochs.

use ndarray::{stack, Array1, Array4, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dataset::{Sample, SharedDataset};
use crate::error::{ConfigError, DatasetError};

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A stacked group of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Images, shape `[batch, channels, height, width]`.
    pub images: Array4<f32>,
    /// Encoded targets, one per image.
    pub targets: Array1<usize>,
}

impl Batch {
    /// Stack `samples` along a new leading axis.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Shape`] if the images disagree in shape or
    /// `samples` is empty.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, DatasetError> {
        let views: Vec<ArrayView3<'_, f32>> = samples.iter().map(|s| s.image.view()).collect();
        let images = stack(Axis(0), &views)?;
        let targets = samples.iter().map(|s| s.target).collect();
        Ok(Batch { images, targets })
    }

    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// `true` for a batch without samples.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LoaderOptions
// ---------------------------------------------------------------------------

/// Batch size, shuffle flag and seed of a [`DataLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Samples per batch.
    pub batch_size: usize,
    /// Draw a new permutation every epoch.
    pub shuffle: bool,
    /// Seed for the shuffle permutation.
    pub seed: u64,
}

impl LoaderOptions {
    /// Unshuffled loading in batches of `batch_size`.
    pub fn new(batch_size: usize) -> Self {
        LoaderOptions { batch_size, shuffle: false, seed: 0 }
    }

    /// Enable or disable shuffling.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the shuffle seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Build a rayon pool with `num_workers` threads, or `None` for sequential
/// fetching when `num_workers == 0`.
pub fn worker_pool(num_workers: usize) -> Result<Option<Arc<ThreadPool>>, ConfigError> {
    if num_workers == 0 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("loader-worker-{i}"))
        .build()
        .map(|pool| Some(Arc::new(pool)))
        .map_err(|e| ConfigError::invalid_value("num_workers", e.to_string()))
}

// ---------------------------------------------------------------------------
// DataLoader
// ---------------------------------------------------------------------------

/// Batched iteration over a shared dataset.
pub struct DataLoader {
    dataset: SharedDataset,
    options: LoaderOptions,
    pool: Option<Arc<ThreadPool>>,
    epoch: AtomicU64,
}

impl DataLoader {
    /// Create a sequential loader.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `options.batch_size == 0`.
    pub fn new(dataset: SharedDataset, options: LoaderOptions) -> Result<Self, ConfigError> {
        if options.batch_size == 0 {
            return Err(ConfigError::invalid_value("batch_size", "must be > 0"));
        }
        Ok(DataLoader {
            dataset,
            options,
            pool: None,
            epoch: AtomicU64::new(0),
        })
    }

    /// Fetch samples on `pool` (`None` keeps sequential fetching).
    pub fn with_workers(mut self, pool: Option<Arc<ThreadPool>>) -> Self {
        self.pool = pool;
        self
    }

    /// The dataset this loader draws from.
    pub fn dataset(&self) -> &SharedDataset {
        &self.dataset
    }

    /// Loader options.
    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Worker threads used for fetching (0 = sequential).
    pub fn num_workers(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.current_num_threads())
    }

    /// Number of samples per epoch.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// `true` when the underlying dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Number of (possibly partial) batches per epoch.
    pub fn num_batches(&self) -> usize {
        batch_count(self.len(), self.options.batch_size)
    }

    /// Iterate the next epoch.
    ///
    /// Shuffled loaders advance their epoch counter on every call.
    pub fn iter(&self) -> BatchIter<'_> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        self.iter_epoch(epoch)
    }

    /// Iterate a specific epoch without advancing the counter.
    pub fn iter_epoch(&self, epoch: u64) -> BatchIter<'_> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        if self.options.shuffle {
            let mut rng = StdRng::seed_from_u64(epoch_seed(self.options.seed, epoch));
            indices.shuffle(&mut rng);
        }
        self.batches(indices)
    }

    /// Iterate in dataset order, ignoring the shuffle flag.
    ///
    /// Statistics passes use this order so consecutive passes see the same
    /// batches.
    pub fn iter_ordered(&self) -> BatchIter<'_> {
        self.batches((0..self.len()).collect())
    }

    fn batches(&self, indices: Vec<usize>) -> BatchIter<'_> {
        BatchIter {
            loader: self,
            indices,
            cursor: 0,
        }
    }

    fn fetch(&self, indices: &[usize]) -> Result<Batch, DatasetError> {
        let dataset = &self.dataset;
        let samples: Vec<Sample> = match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| dataset.get(i))
                    .collect::<Result<Vec<_>, _>>()
            })?,
            None => indices
                .iter()
                .map(|&i| dataset.get(i))
                .collect::<Result<Vec<_>, _>>()?,
        };
        Batch::from_samples(samples)
    }
}

impl std::fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("dataset", &self.dataset.name())
            .field("len", &self.len())
            .field("options", &self.options)
            .field("num_workers", &self.num_workers())
            .finish()
    }
}

/// Batches needed for `n` samples, counting a partial last batch.
fn batch_count(n: usize, batch_size: usize) -> usize {
    n / batch_size + usize::from(n % batch_size != 0)
}

/// SplitMix64 finalizer over the seed and epoch.
fn epoch_seed(seed: u64, epoch: u64) -> u64 {
    let mut z = seed ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// BatchIter
// ---------------------------------------------------------------------------

/// Iterator over the batches of one epoch.
///
/// A failed sample fetch is yielded as an error for that batch; iteration
/// continues with the next batch if the caller keeps polling.
pub struct BatchIter<'a> {
    loader: &'a DataLoader,
    indices: Vec<usize>,
    cursor: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = self.cursor.saturating_add(self.loader.options.batch_size).min(self.indices.len());
        let batch = self.loader.fetch(&self.indices[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = batch_count(self.indices.len() - self.cursor, self.loader.options.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BatchIter<'_> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
