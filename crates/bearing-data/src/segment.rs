//! Segmenting spectrogram dataset.
//!
//! A [`SegmentDataset`] wraps one raw signal file. The signal is cut into
//! non-overlapping segments of `seg_length` samples; segment `i` covers
//! `[i * seg_length, (i + 1) * seg_length)` and a trailing partial segment
//! is dropped. Each access reloads the signal, computes the decibel STFT
//! magnitude of the requested segment, adds a channel axis and applies the
//! image transform (normally a resize).
//!
//! Nothing is cached between calls: memory stays bounded by one signal per
//! concurrent reader, at the cost of recomputing on every read.

use bearing_signal::{db_spectrogram, StftConfig, WindowFunction};
use ndarray::{Array1, Axis, Slice};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::dataset::{LabeledDataset, Sample};
use crate::error::{ConfigError, DatasetError};
use crate::transform::ImageTransform;

/// Loads the raw 1-D signal stored in a data file.
pub type SignalLoader = Arc<dyn Fn(&Path) -> Result<Array1<f64>, DatasetError> + Send + Sync>;

// ---------------------------------------------------------------------------
// SegmentParams
// ---------------------------------------------------------------------------

/// Segmentation and STFT sizes shared by every file of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentParams {
    /// Samples per segment.
    pub seg_length: usize,
    /// STFT window and FFT length.
    pub win_length: usize,
    /// STFT hop length.
    pub hop_length: usize,
    /// STFT analysis window.
    pub window: WindowFunction,
}

impl SegmentParams {
    /// Rectangular-window parameters.
    pub fn new(seg_length: usize, win_length: usize, hop_length: usize) -> Self {
        SegmentParams {
            seg_length,
            win_length,
            hop_length,
            window: WindowFunction::Rectangular,
        }
    }

    /// Require `0 < hop_length <= win_length <= seg_length`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hop_length == 0 {
            return Err(ConfigError::invalid_value("hop_length", "must be > 0"));
        }
        if self.hop_length > self.win_length {
            return Err(ConfigError::invalid_value("hop_length", "must be <= win_length"));
        }
        if self.win_length > self.seg_length {
            return Err(ConfigError::invalid_value("win_length", "must be <= seg_length"));
        }
        Ok(())
    }

    /// Number of whole segments in a signal of `signal_len` samples.
    pub fn segment_count(&self, signal_len: usize) -> usize {
        signal_len / self.seg_length
    }

    /// Sample range covered by segment `idx`.
    pub fn segment_bounds(&self, idx: usize) -> Range<usize> {
        idx * self.seg_length..(idx + 1) * self.seg_length
    }

    /// STFT configuration for one segment.
    pub fn stft_config(&self) -> StftConfig {
        StftConfig::new(self.win_length, self.hop_length).with_window(self.window)
    }
}

// ---------------------------------------------------------------------------
// SegmentDataset
// ---------------------------------------------------------------------------

/// Lazily computed spectrogram segments of one raw signal file.
pub struct SegmentDataset {
    data_file: PathBuf,
    target: usize,
    params: SegmentParams,
    loader: SignalLoader,
    transform: Arc<dyn ImageTransform>,
    num_segments: usize,
    name: String,
}

impl SegmentDataset {
    /// Index `data_file` by loading it once and counting whole segments.
    ///
    /// A signal shorter than one segment yields an empty dataset.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidParams`] for unusable segment sizes and
    /// any error produced by `loader`.
    pub fn new(
        data_file: impl Into<PathBuf>,
        target: usize,
        params: SegmentParams,
        loader: SignalLoader,
        transform: Arc<dyn ImageTransform>,
    ) -> Result<Self, DatasetError> {
        params
            .validate()
            .map_err(|e| DatasetError::InvalidParams(e.to_string()))?;

        let data_file = data_file.into();
        let signal = loader(&data_file)?;
        let num_segments = params.segment_count(signal.len());
        if num_segments == 0 {
            debug!(
                "{}: {} samples is shorter than one segment of {}",
                data_file.display(),
                signal.len(),
                params.seg_length
            );
        }

        let name = data_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "SegmentDataset".to_string());

        Ok(SegmentDataset {
            data_file,
            target,
            params,
            loader,
            transform,
            num_segments,
            name,
        })
    }

    /// Source file of this dataset.
    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Class shared by every segment of the file.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Segmentation parameters.
    pub fn params(&self) -> &SegmentParams {
        &self.params
    }
}

impl LabeledDataset for SegmentDataset {
    fn len(&self) -> usize {
        self.num_segments
    }

    fn get(&self, idx: usize) -> Result<Sample, DatasetError> {
        if idx >= self.num_segments {
            return Err(DatasetError::IndexOutOfBounds { idx, len: self.num_segments });
        }

        let signal = (self.loader)(&self.data_file)?;
        let bounds = self.params.segment_bounds(idx);
        if bounds.end > signal.len() {
            return Err(DatasetError::invalid_format(
                &self.data_file,
                format!(
                    "segment {idx} needs samples {}..{} but the signal now has {}",
                    bounds.start,
                    bounds.end,
                    signal.len()
                ),
            ));
        }

        let segment = signal.slice_axis(Axis(0), Slice::from(bounds)).to_vec();
        let db = db_spectrogram(&segment, &self.params.stft_config())?;
        let image = self.transform.apply(db.insert_axis(Axis(0)))?;

        Ok(Sample::new(image, self.target))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
