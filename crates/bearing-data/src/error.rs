//! Error types for the bearing data pipeline.
//!
//! Every module that produces an error imports its error type from here.
//!
//! ## Hierarchy
//!
//! ```text
//! PipelineError (top-level)
//! ├── Sequence         (stage run before its prerequisite)
//! ├── UnknownAdapter   (registry lookup failure)
//! ├── ConfigError      (config validation / file loading)
//! ├── DatasetError     (adapter I/O, signal format, sample access)
//! ├── StatsError       (streaming statistics)
//! └── EncoderError     (label encoding / encoder persistence)
//! ```

use bearing_signal::SignalError;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Stage;

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used by the staged pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

// ---------------------------------------------------------------------------
// PipelineError (top-level aggregator)
// ---------------------------------------------------------------------------

/// Top-level error type for the staged pipeline.
///
/// Lower-level modules return their own error types which coerce into
/// `PipelineError` via [`From`]. A failed stage never leaves the pipeline
/// partially mutated.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage was invoked before the stage that produces its input.
    #[error("Stage `{stage}` requires {missing}")]
    Sequence {
        /// The stage that was invoked.
        stage: Stage,
        /// Description of the missing state.
        missing: &'static str,
    },

    /// No adapter is registered under the requested name.
    #[error("Unregistered dataset adapter `{name}` (available: {available:?})")]
    UnknownAdapter {
        /// Requested name.
        name: String,
        /// Names currently registered.
        available: Vec<String>,
    },

    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A dataset loading or access error.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// A statistics pass failed.
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    /// Label encoding failed.
    #[error("Label encoding error: {0}")]
    Encoder(#[from] EncoderError),
}

impl PipelineError {
    /// Construct a [`PipelineError::Sequence`].
    pub fn sequence(stage: Stage, missing: &'static str) -> Self {
        PipelineError::Sequence { stage, missing }
    }

    /// Returns `true` for stage-ordering violations.
    pub fn is_sequence(&self) -> bool {
        matches!(self, PipelineError::Sequence { .. })
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a [`PipelineConfig`] or stage
/// parameters.
///
/// [`PipelineConfig`]: crate::config::PipelineConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{path}`: {source}")]
    FileAccess {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DatasetError
// ---------------------------------------------------------------------------

/// Errors produced while discovering, loading or accessing samples.
///
/// Adapters surface their I/O failures through this type unchanged; the
/// pipeline never retries or suppresses them.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A required data file or directory was not found on disk.
    #[error("Data not found at `{path}`: {message}")]
    DataNotFound {
        /// Path that was expected to contain data.
        path: PathBuf,
        /// Additional context.
        message: String,
    },

    /// A file was found but its content is not usable.
    #[error("Invalid data format in `{path}`: {message}")]
    InvalidFormat {
        /// Path of the malformed file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A low-level I/O error while reading or writing a data file.
    #[error("I/O error on `{path}`: {source}")]
    IoError {
        /// Path being accessed when the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A sample index is out of bounds.
    #[error("Index {idx} out of bounds (dataset has {len} samples)")]
    IndexOutOfBounds {
        /// The requested index.
        idx: usize,
        /// Total length of the dataset.
        len: usize,
    },

    /// Segmentation or transform parameters are unusable.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Spectrogram or resize computation failed.
    #[error("Signal processing error: {0}")]
    Signal(#[from] SignalError),

    /// Samples in one batch disagree in shape.
    #[error("Cannot stack batch: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// An I/O error that carries no path context.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatasetError {
    /// Construct a [`DatasetError::DataNotFound`].
    pub fn not_found<S: Into<String>>(path: impl Into<PathBuf>, msg: S) -> Self {
        DatasetError::DataNotFound {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Construct a [`DatasetError::InvalidFormat`].
    pub fn invalid_format<S: Into<String>>(path: impl Into<PathBuf>, msg: S) -> Self {
        DatasetError::InvalidFormat {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Construct a [`DatasetError::IoError`].
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::IoError {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// StatsError
// ---------------------------------------------------------------------------

/// Errors produced by the streaming statistics passes.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The loader produced no pixels, so no statistic is defined.
    #[error("Loader yielded no pixel values; statistics are undefined")]
    EmptyLoader,

    /// A statistic produced a scale that cannot be divided by.
    #[error("Degenerate {what}: {value} (cannot normalize by a zero or non-finite scale)")]
    DegenerateScale {
        /// Which quantity was degenerate.
        what: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Fetching a batch failed mid-pass.
    #[error("Batch fetch failed: {0}")]
    Dataset(#[from] DatasetError),
}

// ---------------------------------------------------------------------------
// EncoderError
// ---------------------------------------------------------------------------

/// Errors produced by the label encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// An encoder cannot be fit on zero labels.
    #[error("Cannot fit a label encoder on an empty label set")]
    Empty,

    /// The label was not seen when the encoder was fit.
    #[error("Unknown label `{label}`")]
    UnknownLabel {
        /// The label that failed lookup.
        label: String,
    },

    /// The integer target has no class.
    #[error("Unknown target {target} (encoder has {num_classes} classes)")]
    UnknownTarget {
        /// The target that failed lookup.
        target: usize,
        /// Number of known classes.
        num_classes: usize,
    },

    /// Reading or writing the persisted encoder failed.
    #[error("Cannot access encoder file `{path}`: {source}")]
    Io {
        /// Encoder file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted encoder is not valid JSON.
    #[error("Cannot parse encoder file `{path}`: {source}")]
    Parse {
        /// Encoder file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}
