//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every parameter the staged pipeline needs, from
//! segmentation and STFT sizes to the split fractions and loader settings.
//! It is serializable via [`serde`] so a run can be reproduced from a JSON
//! file.
//!
//! # Example
//!
//! ```rust
//! use bearing_data::config::PipelineConfig;
//!
//! let cfg = PipelineConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.seg_length, 1024);
//! assert_eq!(cfg.image_size, [64, 64]);
//! ```

use bearing_signal::WindowFunction;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::segment::SegmentParams;

/// Tolerance on the sum of the split fractions.
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // -----------------------------------------------------------------------
    // Source
    // -----------------------------------------------------------------------
    /// Registered adapter name. Default: **"synthetic"**.
    pub adapter: String,

    /// Data directory; downloaded into when absent. Default: **data/synthetic**.
    pub data_dir: PathBuf,

    /// Reuse `<data_dir>/.encoder.json` across runs. Default: **false**.
    pub cache_label_encoder: bool,

    // -----------------------------------------------------------------------
    // Segmentation / spectrogram
    // -----------------------------------------------------------------------
    /// Output image `[height, width]`. Default: **[64, 64]**.
    pub image_size: [usize; 2],

    /// Samples per segment. Default: **1024**.
    pub seg_length: usize,

    /// STFT window (and FFT) length. Default: **512**.
    pub win_length: usize,

    /// STFT hop length. Default: **128**.
    pub hop_length: usize,

    /// STFT analysis window. Default: **rectangular**.
    pub window: WindowFunction,

    // -----------------------------------------------------------------------
    // Split / loading
    // -----------------------------------------------------------------------
    /// Train / validation / test fractions. Default: **[0.8, 0.1, 0.1]**.
    pub fractions: [f64; 3],

    /// Samples per batch. Default: **32**.
    pub batch_size: usize,

    /// Parallel fetch threads per loader (0 = sequential). Default: **8**.
    pub num_workers: usize,

    /// Seed for the split permutation and train-loader shuffle. Default: **0**.
    pub seed: u64,

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------
    /// Outlier threshold in standard deviations. Default: **2.0**.
    pub n_sigma: f64,

    /// Run the min-max stage between truncation and normalization.
    /// Default: **false**.
    pub min_max_scale: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            adapter: "synthetic".to_string(),
            data_dir: PathBuf::from("data").join("synthetic"),
            cache_label_encoder: false,
            image_size: [64, 64],
            seg_length: 1024,
            win_length: 512,
            hop_length: 128,
            window: WindowFunction::Rectangular,
            fractions: [0.8, 0.1, 0.1],
            batch_size: 32,
            num_workers: 8,
            seed: 0,
            n_sigma: 2.0,
            min_max_scale: false,
        }
    }
}

impl PipelineConfig {
    /// Load a [`PipelineConfig`] from a JSON file at `path`.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileAccess`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the JSON is malformed, and
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: PipelineConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize this configuration to pretty-printed JSON at `path`,
    /// creating parent directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileAccess {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Segmentation parameters for the dataset stage.
    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            seg_length: self.seg_length,
            win_length: self.win_length,
            hop_length: self.hop_length,
            window: self.window,
        }
    }

    /// Image size as `(height, width)`.
    pub fn image_size(&self) -> (usize, usize) {
        (self.image_size[0], self.image_size[1])
    }

    /// Validate all fields and return an error describing the first problem
    /// found.
    ///
    /// # Validated invariants
    ///
    /// - Image dimensions must be non-zero.
    /// - `0 < hop_length <= win_length <= seg_length`.
    /// - Fractions must be positive and sum to 1.
    /// - `batch_size` must be at least 1.
    /// - `n_sigma` must be positive and finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.adapter.trim().is_empty() {
            return Err(ConfigError::invalid_value("adapter", "must not be empty"));
        }
        if self.image_size.iter().any(|&d| d == 0) {
            return Err(ConfigError::invalid_value("image_size", "both dimensions must be > 0"));
        }
        self.segment_params().validate()?;
        validate_fractions(&self.fractions)?;
        if self.batch_size == 0 {
            return Err(ConfigError::invalid_value("batch_size", "must be > 0"));
        }
        validate_n_sigma(self.n_sigma)?;
        Ok(())
    }
}

/// Check that split fractions are positive and sum to 1.
pub fn validate_fractions(fractions: &[f64; 3]) -> Result<(), ConfigError> {
    if fractions.iter().any(|&f| f <= 0.0 || !f.is_finite()) {
        return Err(ConfigError::invalid_value(
            "fractions",
            format!("each fraction must be positive and finite, got {fractions:?}"),
        ));
    }
    let sum: f64 = fractions.iter().sum();
    if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
        return Err(ConfigError::invalid_value(
            "fractions",
            format!("fractions must sum to 1.0, got {sum}"),
        ));
    }
    Ok(())
}

/// Check that an outlier threshold is usable.
pub fn validate_n_sigma(n_sigma: f64) -> Result<(), ConfigError> {
    if n_sigma <= 0.0 || !n_sigma.is_finite() {
        return Err(ConfigError::invalid_value(
            "n_sigma",
            format!("must be positive and finite, got {n_sigma}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
