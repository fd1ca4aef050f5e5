//! Short-Time Fourier Transform magnitude spectrograms.
//!
//! Frames are centred on multiples of the hop length: the signal is
//! reflect-padded by `n_fft / 2` samples on both sides before framing, so a
//! signal of length `L` yields `1 + L / hop_length` frames. Only the
//! one-sided spectrum (`n_fft / 2 + 1` bins) is kept.
//!
//! Output layout: rows = frequency bins, columns = time frames.

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{Result, SignalError};

/// Analysis window applied to each frame before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// Rectangular (no windowing)
    #[default]
    Rectangular,
    /// Hann window (cosine-squared taper)
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window (lower sidelobe level)
    Blackman,
}

/// STFT parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftConfig {
    /// FFT size; also the frame length.
    pub n_fft: usize,
    /// Step between consecutive frames.
    pub hop_length: usize,
    /// Window function to apply.
    pub window: WindowFunction,
    /// Reflect-pad the signal so frames are centred on `t * hop_length`.
    pub center: bool,
}

impl StftConfig {
    /// Centred, rectangular-window STFT.
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        Self {
            n_fft,
            hop_length,
            window: WindowFunction::Rectangular,
            center: true,
        }
    }

    /// Replace the analysis window.
    pub fn with_window(mut self, window: WindowFunction) -> Self {
        self.window = window;
        self
    }

    /// Number of one-sided frequency bins.
    pub fn n_freq(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `signal_len` samples, or
    /// `None` if the signal is too short to frame.
    pub fn n_frames(&self, signal_len: usize) -> Option<usize> {
        if self.hop_length == 0 {
            return None;
        }
        let padded = if self.center {
            signal_len + 2 * (self.n_fft / 2)
        } else {
            signal_len
        };
        if padded < self.n_fft {
            return None;
        }
        Some((padded - self.n_fft) / self.hop_length + 1)
    }

    fn validate(&self, signal_len: usize) -> Result<()> {
        if self.n_fft == 0 {
            return Err(SignalError::InvalidFftSize);
        }
        if self.hop_length == 0 {
            return Err(SignalError::InvalidHopLength);
        }
        // Reflect padding needs strictly more samples than the pad width.
        let required = if self.center {
            self.n_fft / 2 + 1
        } else {
            self.n_fft
        };
        if signal_len < required {
            return Err(SignalError::SignalTooShort {
                signal_len,
                required,
            });
        }
        Ok(())
    }
}

/// Compute the STFT magnitude of a 1-D signal.
///
/// Returns a `[n_fft / 2 + 1, n_frames]` matrix of `|X(f, t)|`.
pub fn stft_magnitude(signal: &[f64], config: &StftConfig) -> Result<Array2<f64>> {
    config.validate(signal.len())?;

    let padded = if config.center {
        reflect_pad(signal, config.n_fft / 2)
    } else {
        signal.to_vec()
    };

    let n_fft = config.n_fft;
    let n_freq = config.n_freq();
    let n_frames = (padded.len() - n_fft) / config.hop_length + 1;
    let window = make_window(config.window, n_fft);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut data = Array2::zeros((n_freq, n_frames));
    let mut buffer = vec![Complex64::new(0.0, 0.0); n_fft];

    for frame in 0..n_frames {
        let start = frame * config.hop_length;
        for (slot, (&s, &w)) in buffer
            .iter_mut()
            .zip(padded[start..start + n_fft].iter().zip(window.iter()))
        {
            *slot = Complex64::new(s * w, 0.0);
        }

        fft.process(&mut buffer);

        for bin in 0..n_freq {
            data[[bin, frame]] = buffer[bin].norm();
        }
    }

    Ok(data)
}

/// Convert magnitudes to decibels: `20 * log10(magnitude)`.
///
/// Zero magnitude maps to `-inf`.
pub fn amplitude_to_db(magnitude: &Array2<f64>) -> Array2<f64> {
    magnitude.mapv(|m| 20.0 * m.log10())
}

/// Decibel-scaled STFT magnitude, as `f32` image data.
pub fn db_spectrogram(signal: &[f64], config: &StftConfig) -> Result<Array2<f32>> {
    let magnitude = stft_magnitude(signal, config)?;
    Ok(amplitude_to_db(&magnitude).mapv(|v| v as f32))
}

/// Mirror `pad` samples on both ends without repeating the edge sample.
fn reflect_pad(signal: &[f64], pad: usize) -> Vec<f64> {
    let n = signal.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=pad).map(|i| signal[n - 1 - i]));
    out
}

/// Generate a symmetric window function.
fn make_window(kind: WindowFunction, size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let n = (size - 1) as f64;
    match kind {
        WindowFunction::Rectangular => vec![1.0; size],
        WindowFunction::Hann => (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n).cos()))
            .collect(),
        WindowFunction::Hamming => (0..size)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n).cos())
            .collect(),
        WindowFunction::Blackman => (0..size)
            .map(|i| {
                0.42 - 0.5 * (2.0 * PI * i as f64 / n).cos()
                    + 0.08 * (4.0 * PI * i as f64 / n).cos()
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tone(len: usize, freq: f64, sample_rate: f64) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_centered_dimensions() {
        let signal = tone(1024, 5.0, 100.0);
        let config = StftConfig::new(128, 32);
        let spec = stft_magnitude(&signal, &config).unwrap();
        assert_eq!(spec.dim(), (65, 1 + 1024 / 32));
        assert_eq!(config.n_frames(1024), Some(33));
    }

    #[test]
    fn test_uncentered_dimensions() {
        let signal = tone(1000, 5.0, 100.0);
        let config = StftConfig {
            center: false,
            ..StftConfig::new(128, 32)
        };
        let spec = stft_magnitude(&signal, &config).unwrap();
        assert_eq!(spec.dim(), (65, (1000 - 128) / 32 + 1));
    }

    #[test]
    fn test_reflect_pad_mirrors_without_edge() {
        let padded = reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_single_frequency_peak() {
        // 10 Hz at 100 Hz sampling with a 256-point FFT: bin 25.6
        let signal = tone(1024, 10.0, 100.0);
        let config = StftConfig::new(256, 128).with_window(WindowFunction::Hann);
        let spec = stft_magnitude(&signal, &config).unwrap();

        // Interior frame, clear of the padded edges.
        let frame = spec.column(4);
        let peak_bin = frame
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((25..=26).contains(&peak_bin), "peak at bin {peak_bin}");
    }

    #[test]
    fn test_dc_signal_rectangular_window() {
        // Constant input: all energy in bin 0, magnitude = n_fft * value.
        let signal = vec![0.5; 64];
        let config = StftConfig::new(16, 4);
        let spec = stft_magnitude(&signal, &config).unwrap();
        for frame in 0..spec.ncols() {
            assert_abs_diff_eq!(spec[[0, frame]], 8.0, epsilon = 1e-9);
            assert_abs_diff_eq!(spec[[3, frame]], 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_amplitude_to_db() {
        let mag = Array2::from_shape_vec((1, 3), vec![1.0, 10.0, 0.0]).unwrap();
        let db = amplitude_to_db(&mag);
        assert_abs_diff_eq!(db[[0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(db[[0, 1]], 20.0, epsilon = 1e-12);
        assert_eq!(db[[0, 2]], f64::NEG_INFINITY);
    }

    #[test]
    fn test_window_functions_symmetric() {
        for wf in [
            WindowFunction::Hann,
            WindowFunction::Hamming,
            WindowFunction::Blackman,
        ] {
            let w = make_window(wf, 64);
            for i in 0..32 {
                assert!(
                    (w[i] - w[63 - i]).abs() < 1e-10,
                    "{:?} not symmetric at {}",
                    wf,
                    i
                );
            }
        }
    }

    #[test]
    fn test_signal_too_short() {
        let config = StftConfig::new(256, 64);
        assert!(matches!(
            stft_magnitude(&[1.0; 10], &config),
            Err(SignalError::SignalTooShort { .. })
        ));
    }

    #[test]
    fn test_zero_hop_rejected() {
        let config = StftConfig::new(16, 0);
        assert!(matches!(
            stft_magnitude(&[1.0; 64], &config),
            Err(SignalError::InvalidHopLength)
        ));
        assert_eq!(config.n_frames(64), None);
    }
}
