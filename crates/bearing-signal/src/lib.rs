//! Bearing Signal Processing Library
//!
//! Time-frequency primitives used to turn raw 1-D vibration recordings into
//! fixed-size spectrogram images:
//!
//! - **STFT**: centred short-time Fourier transform magnitude with a
//!   configurable analysis window ([`stft`]).
//! - **Decibels**: `20 * log10(magnitude)` conversion.
//! - **Resampling**: separable bilinear resize of 2-D images ([`resize`]).
//!
//! # Example
//!
//! ```rust
//! use bearing_signal::{db_spectrogram, resize_bilinear, StftConfig};
//!
//! let signal: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.37).sin()).collect();
//! let config = StftConfig::new(256, 64);
//!
//! let db = db_spectrogram(&signal, &config).unwrap();
//! assert_eq!(db.dim(), (129, 17));
//!
//! let image = resize_bilinear(db.view(), 64, 64).unwrap();
//! assert_eq!(image.dim(), (64, 64));
//! ```

pub mod resize;
pub mod stft;

pub use resize::{interp_weights, resize_bilinear};
pub use stft::{amplitude_to_db, db_spectrogram, stft_magnitude, StftConfig, WindowFunction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for signal processing operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Unified error type for signal processing operations
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// FFT size of zero.
    #[error("FFT size must be > 0")]
    InvalidFftSize,

    /// Hop length of zero.
    #[error("Hop length must be > 0")]
    InvalidHopLength,

    /// The signal cannot be framed with the requested FFT size.
    #[error("Signal too short ({signal_len} samples), at least {required} required")]
    SignalTooShort {
        /// Length of the offending signal.
        signal_len: usize,
        /// Minimum length for the configured transform.
        required: usize,
    },

    /// Resize source image has a zero-length axis.
    #[error("Cannot resize an empty {height}x{width} image")]
    EmptyImage {
        /// Source height.
        height: usize,
        /// Source width.
        width: usize,
    },

    /// Resize target has a zero-length axis.
    #[error("Invalid target size {height}x{width}: both dimensions must be > 0")]
    InvalidTargetSize {
        /// Requested height.
        height: usize,
        /// Requested width.
        width: usize,
    },
}
