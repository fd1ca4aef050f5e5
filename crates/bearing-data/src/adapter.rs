//! Source adapters: where raw signals come from.
//!
//! A [`SourceAdapter`] knows one on-disk dataset layout. Given a root
//! directory it can fetch the data, list the raw signal files, derive each
//! file's string label, and load a file's 1-D signal. The pipeline never
//! inspects files itself; everything dataset-specific lives behind this
//! trait.
//!
//! [`NpyFolderAdapter`] handles the common `<root>/<label>/*.npy` layout.

use ndarray::Array1;
use ndarray_npy::{ReadNpyError, ReadNpyExt, WriteNpyExt};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::DatasetError;

// ---------------------------------------------------------------------------
// SourceAdapter trait
// ---------------------------------------------------------------------------

/// Dataset-specific file discovery, labelling and signal loading.
///
/// Implementations are shared with loader worker threads and must be
/// `Send + Sync`.
pub trait SourceAdapter: Send + Sync {
    /// Make the raw data available under `target_dir`.
    ///
    /// Called by the pipeline only when `target_dir` does not exist; calling
    /// it again on a populated directory must be harmless.
    fn download(&self, target_dir: &Path) -> Result<(), DatasetError>;

    /// Raw data files under `dir`, in a stable (sorted) order.
    fn list_data_files(&self, dir: &Path) -> Result<Vec<PathBuf>, DatasetError>;

    /// Categorical label of `file`.
    fn read_label(&self, file: &Path) -> Result<String, DatasetError>;

    /// 1-D signal stored in `file`.
    fn load_signal(&self, file: &Path) -> Result<Array1<f64>, DatasetError>;

    /// Adapter name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// NpyFolderAdapter
// ---------------------------------------------------------------------------

/// `<root>/<label>/*.npy` layout with one 1-D signal per file.
///
/// The label of a file is the name of its parent directory. Signals may be
/// stored as `f64` or `f32`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpyFolderAdapter;

impl NpyFolderAdapter {
    /// Registry name.
    pub const NAME: &'static str = "npy-folder";

    /// Create the adapter.
    pub fn new() -> Self {
        NpyFolderAdapter
    }
}

impl SourceAdapter for NpyFolderAdapter {
    fn download(&self, target_dir: &Path) -> Result<(), DatasetError> {
        if target_dir.is_dir() {
            return Ok(());
        }
        Err(DatasetError::not_found(
            target_dir,
            "npy-folder data must be placed on disk beforehand",
        ))
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
// Layout and NPY helpers
// ---------------------------------------------------------------------------

/// Every `*.npy` file one directory level below `root`, sorted by path.
///
/// # Errors
///
/// [`DatasetError::DataNotFound`] if `root` is not a directory and
/// [`DatasetError::IoError`] if a directory cannot be read.
pub fn list_npy_files(root: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    if !root.is_dir() {
        return Err(DatasetError::not_found(root, "data directory does not exist"));
    }

    let mut files = Vec::new();
    for class_dir in sorted_entries(root)? {
        if !class_dir.is_dir() {
            continue;
        }
        files.extend(
            sorted_entries(&class_dir)?
                .into_iter()
                .filter(|p| p.is_file() && p.extension().map_or(false, |e| e == "npy")),
        );
    }

    debug!("Found {} .npy files under {}", files.len(), root.display());
    Ok(files)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| DatasetError::io_error(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Name of the directory containing `file`.
pub fn label_from_parent(file: &Path) -> Result<String, DatasetError> {
    file.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| DatasetError::invalid_format(file, "file has no parent directory to take a label from"))
}

/// Read a 1-D NPY signal, widening `f32` data to `f64`.
pub fn read_signal_npy(path: &Path) -> Result<Array1<f64>, DatasetError> {
    let open = || File::open(path).map_err(|e| DatasetError::io_error(path, e));

    match Array1::<f64>::read_npy(open()?) {
        Ok(signal) => Ok(signal),
        Err(ReadNpyError::WrongDescriptor(_)) => Array1::<f32>::read_npy(open()?)
            .map(|signal| signal.mapv(f64::from))
            .map_err(|e| npy_format_error(path, e)),
        Err(e) => Err(npy_format_error(path, e)),
    }
}

/// Write a 1-D `f64` signal as NPY, creating parent directories.
pub fn write_signal_npy(path: &Path, signal: &Array1<f64>) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::io_error(parent, e))?;
    }
    let file = File::create(path).map_err(|e| DatasetError::io_error(path, e))?;
    signal
        .write_npy(BufWriter::new(file))
        .map_err(|e| DatasetError::invalid_format(path, format!("NPY write error: {e}")))
}

fn npy_format_error(path: &Path, e: ReadNpyError) -> DatasetError {
    DatasetError::invalid_format(path, format!("expected a 1-D f64 or f32 NPY array: {e}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
