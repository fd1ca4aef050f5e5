//! String label to integer target encoding.
//!
//! Classes are the distinct labels sorted lexicographically and numbered
//! from zero. An encoder can be persisted as JSON next to the data so that
//! later runs reuse the same numbering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::EncoderError;

/// File name of the persisted encoder inside a data directory.
pub const ENCODER_FILE: &str = ".encoder.json";

/// Sorted-class label encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on every label in `labels`; duplicates are collapsed.
    ///
    /// # Errors
    ///
    /// [`EncoderError::Empty`] if `labels` yields nothing.
    pub fn fit<I, S>(labels: I) -> Result<Self, EncoderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = labels.into_iter().map(|l| l.as_ref().to_owned()).collect();
        if classes.is_empty() {
            return Err(EncoderError::Empty);
        }
        Ok(LabelEncoder {
            classes: classes.into_iter().collect(),
        })
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Classes in target order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// `true` if `label` has a target.
    pub fn contains(&self, label: &str) -> bool {
        self.encode(label).is_ok()
    }

    /// Target of `label`.
    pub fn encode(&self, label: &str) -> Result<usize, EncoderError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| EncoderError::UnknownLabel { label: label.to_owned() })
    }

    /// Targets of every label, failing on the first unknown one.
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, EncoderError> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    /// Label of `target`.
    pub fn decode(&self, target: usize) -> Result<&str, EncoderError> {
        self.classes
            .get(target)
            .map(String::as_str)
            .ok_or(EncoderError::UnknownTarget {
                target,
                num_classes: self.classes.len(),
            })
    }

    /// Write the encoder as JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<(), EncoderError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| EncoderError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| EncoderError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read an encoder previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, EncoderError> {
        let contents = std::fs::read_to_string(path).map_err(|source| EncoderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let encoder: LabelEncoder =
            serde_json::from_str(&contents).map_err(|source| EncoderError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if encoder.classes.is_empty() {
            return Err(EncoderError::Empty);
        }
        Ok(encoder)
    }

    /// Reuse the encoder at `path` if it knows every label in `labels`;
    /// otherwise fit a new one and write it to `path`.
    ///
    /// An unreadable or stale cache is replaced, not reported.
    pub fn load_or_fit<S: AsRef<str>>(path: &Path, labels: &[S]) -> Result<Self, EncoderError> {
        if path.exists() {
            match LabelEncoder::load(path) {
                Ok(encoder) if labels.iter().all(|l| encoder.contains(l.as_ref())) => {
                    debug!("Reusing label encoder from {}", path.display());
                    return Ok(encoder);
                }
                Ok(_) => warn!(
                    "Cached label encoder at {} is missing labels; refitting",
                    path.display()
                ),
                Err(e) => warn!("Ignoring unusable label encoder cache: {e}"),
            }
        }
        let encoder = LabelEncoder::fit(labels.iter().map(|l| l.as_ref()))?;
        encoder.save(path)?;
        debug!("Saved label encoder ({} classes) to {}", encoder.num_classes(), path.display());
        Ok(encoder)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
