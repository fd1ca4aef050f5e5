//! Deterministic synthetic bearing recordings.
//!
//! [`SyntheticAdapter`] writes a small `<root>/<label>/*.npy` dataset of
//! sinusoidal "vibration" signals on download and then reads it back exactly
//! like [`NpyFolderAdapter`](crate::adapter::NpyFolderAdapter). It needs no
//! network access and is what the `prepare` binary uses by default.
//!
//! ## Signal model
//!
//! File `f` of class `c` holds, for sample `t`:
//!
//! ```text
//! x[t] = a_f · sin(2π·ν_c·t + φ_f) + 0.25·a_f · sin(2π·3ν_c·t)
//! a_f  = 1 + 0.1·f
//! φ_f  = 0.7·f
//! ```
//!
//! where `ν_c` is the class frequency in cycles per sample. No randomness is
//! involved, so every download produces byte-identical files.

use ndarray::Array1;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::adapter::{label_from_parent, list_npy_files, read_signal_npy, write_signal_npy, SourceAdapter};
use crate::error::DatasetError;

// ---------------------------------------------------------------------------
// SyntheticConfig
// ---------------------------------------------------------------------------

/// One synthetic class: its label and fundamental frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticClass {
    /// Directory / label name.
    pub label: String,
    /// Fundamental frequency in cycles per sample (0 < ν < 0.5).
    pub frequency: f64,
}

impl SyntheticClass {
    /// Class `label` at `frequency` cycles per sample.
    pub fn new(label: impl Into<String>, frequency: f64) -> Self {
        SyntheticClass {
            label: label.into(),
            frequency,
        }
    }
}

/// Size and content of the generated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    /// Classes to generate. Default: four bearing conditions.
    pub classes: Vec<SyntheticClass>,
    /// Files per class. Default: **8**.
    pub files_per_class: usize,
    /// Samples per file. Default: **8192**.
    pub samples_per_file: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            classes: vec![
                SyntheticClass::new("ball", 0.0371),
                SyntheticClass::new("inner_race", 0.0713),
                SyntheticClass::new("normal", 0.0127),
                SyntheticClass::new("outer_race", 0.1093),
            ],
            files_per_class: 8,
            samples_per_file: 8192,
        }
    }
}

impl SyntheticConfig {
    /// Total number of files written by a download.
    pub fn num_files(&self) -> usize {
        self.classes.len() * self.files_per_class
    }

    fn validate(&self) -> Result<(), DatasetError> {
        if self.classes.is_empty() || self.files_per_class == 0 || self.samples_per_file == 0 {
            return Err(DatasetError::InvalidParams(
                "synthetic dataset needs at least one class, file and sample".into(),
            ));
        }
        if let Some(c) = self.classes.iter().find(|c| !(c.frequency > 0.0 && c.frequency < 0.5)) {
            return Err(DatasetError::InvalidParams(format!(
                "class `{}` frequency {} is outside (0, 0.5)",
                c.label, c.frequency
            )));
        }
        Ok(())
    }
}

/// Signal of file `file_idx` of a class with fundamental `frequency`.
pub fn synthetic_signal(frequency: f64, file_idx: usize, len: usize) -> Array1<f64> {
    let amplitude = 1.0 + 0.1 * file_idx as f64;
    let phase = 0.7 * file_idx as f64;
    Array1::from_shape_fn(len, |t| {
        let t = t as f64;
        amplitude * (2.0 * PI * frequency * t + phase).sin()
            + 0.25 * amplitude * (2.0 * PI * 3.0 * frequency * t).sin()
    })
}

// ---------------------------------------------------------------------------
// SyntheticAdapter
// ---------------------------------------------------------------------------

/// Adapter that generates its own data on download.
#[derive(Debug, Clone, Default)]
pub struct SyntheticAdapter {
    config: SyntheticConfig,
}

impl SyntheticAdapter {
    /// Registry name.
    pub const NAME: &'static str = "synthetic";

    /// Adapter generating `config`.
    pub fn new(config: SyntheticConfig) -> Self {
        SyntheticAdapter { config }
    }

    /// Generation settings.
    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn file_path(root: &Path, label: &str, file_idx: usize) -> PathBuf {
        root.join(label).join(format!("{label}_{file_idx:03}.npy"))
    }
}

impl SourceAdapter for SyntheticAdapter {
    fn download(&self, target_dir: &Path) -> Result<(), DatasetError> {
        self.config.validate()?;
        let mut written = 0usize;
        for class in &self.config.classes {
            for f in 0..self.config.files_per_class {
                let path = Self::file_path(target_dir, &class.label, f);
                if path.exists() {
                    continue;
                }
                let signal = synthetic_signal(class.frequency, f, self.config.samples_per_file);
                write_signal_npy(&path, &signal)?;
                written += 1;
            }
        }
        if written > 0 {
            info!(
                "Generated {written} synthetic recordings ({} classes) in {}",
                self.config.classes.len(),
                target_dir.display()
            );
        } else {
            debug!("Synthetic data already present in {}", target_dir.display());
        }
        Ok(())
    }

    fn list_data_files(&self, dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
        list_npy_files(dir)
    }

    fn read_label(&self, file: &Path) -> Result<String, DatasetError> {
        label_from_parent(file)
    }

    fn load_signal(&self, file: &Path) -> Result<Array1<f64>, DatasetError> {
        read_signal_npy(file)
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
