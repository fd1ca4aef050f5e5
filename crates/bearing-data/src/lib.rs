//! # Bearing Data Pipeline
//!
//! Turns directories of raw bearing vibration recordings into batched,
//! normalized spectrogram datasets split into train / validation / test
//! partitions.
//!
//! ## Architecture
//!
//! ```text
//! PipelineConfig ──► Pipeline ──► Splits<DataLoader>
//!                       │
//!                 SourceAdapter (registry: npy-folder | synthetic)
//!                       │
//!       ConcatDataset of SegmentDataset (STFT dB → Resize)
//!                       │
//!       SubsetDataset ─► TransformDataset (Clamp, Normalize) ...
//!                       │
//!                stats::compute_mean_std / compute_min_max
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bearing_data::config::PipelineConfig;
//! use bearing_data::pipeline::{Partition, Pipeline};
//!
//! let config = PipelineConfig::default();
//! let mut pipeline = Pipeline::from_registry(&config.adapter).unwrap();
//! pipeline.run(&config).unwrap();
//!
//! let train = pipeline.loader(Partition::Train).unwrap();
//! for batch in train.iter() {
//!     let batch = batch.unwrap();
//!     println!("images {:?}, targets {:?}", batch.images.shape(), batch.targets);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod segment;
pub mod stats;
pub mod synthetic;
pub mod transform;

// Convenient re-exports at the crate root.
pub use adapter::{NpyFolderAdapter, SourceAdapter};
pub use config::PipelineConfig;
pub use dataset::{ConcatDataset, LabeledDataset, Sample, SharedDataset, SubsetDataset};
pub use encoder::LabelEncoder;
pub use error::{ConfigError, DatasetError, EncoderError, PipelineError, PipelineResult, StatsError};
pub use loader::{Batch, DataLoader, LoaderOptions};
pub use pipeline::{Partition, Pipeline, Splits, Stage};
pub use registry::{build_adapter, register_adapter, registered_adapters};
pub use segment::{SegmentDataset, SegmentParams};
pub use synthetic::{SyntheticAdapter, SyntheticConfig};
pub use transform::{ImageTransform, TransformDataset};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
