//! Image transforms and the transform-wrapping dataset.
//!
//! Every normalizing stage of the pipeline is expressed as an
//! [`ImageTransform`] layered on top of an existing dataset with
//! [`TransformDataset`]. Wrapping never touches the layer beneath, so
//! repeated wrapping stacks transforms in application order.

use bearing_signal::resize_bilinear;
use ndarray::{Array3, Axis};
use std::sync::Arc;

use crate::dataset::{LabeledDataset, Sample, SharedDataset};
use crate::error::{DatasetError, StatsError};

// ---------------------------------------------------------------------------
// ImageTransform trait
// ---------------------------------------------------------------------------

/// A per-image operation applied at access time.
pub trait ImageTransform: Send + Sync {
    /// Transform one `[channels, height, width]` image.
    fn apply(&self, image: Array3<f32>) -> Result<Array3<f32>, DatasetError>;

    /// Short description for logging.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// Resize
// ---------------------------------------------------------------------------

/// Bilinear resize of every channel to `height x width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    height: usize,
    width: usize,
}

impl Resize {
    /// Resize to `height x width`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidParams`] if either dimension is zero.
    pub fn new(height: usize, width: usize) -> Result<Self, DatasetError> {
        if height == 0 || width == 0 {
            return Err(DatasetError::InvalidParams(format!(
                "resize target {height}x{width} must be non-zero"
            )));
        }
        Ok(Resize { height, width })
    }

    /// Target `(height, width)`.
    pub fn size(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

impl ImageTransform for Resize {
    fn apply(&self, image: Array3<f32>) -> Result<Array3<f32>, DatasetError> {
        let channels = image.len_of(Axis(0));
        let mut out = Array3::<f32>::zeros((channels, self.height, self.width));
        for (src, mut dst) in image.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            dst.assign(&resize_bilinear(src, self.height, self.width)?);
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        format!("Resize({}x{})", self.height, self.width)
    }
}

// ---------------------------------------------------------------------------
// Clamp
// ---------------------------------------------------------------------------

/// Clip pixel values to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamp {
    min: f32,
    max: f32,
}

impl Clamp {
    /// Clip to `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidParams`] if `min > max` or either bound
    /// is NaN.
    pub fn new(min: f32, max: f32) -> Result<Self, DatasetError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(DatasetError::InvalidParams(format!(
                "clamp bounds [{min}, {max}] are not ordered"
            )));
        }
        Ok(Clamp { min, max })
    }

    /// Symmetric bounds `[-limit, limit]`.
    pub fn symmetric(limit: f32) -> Result<Self, DatasetError> {
        Clamp::new(-limit, limit)
    }

    /// Lower and upper bound.
    pub fn bounds(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

impl ImageTransform for Clamp {
    fn apply(&self, mut image: Array3<f32>) -> Result<Array3<f32>, DatasetError> {
        image.mapv_inplace(|v| v.clamp(self.min, self.max));
        Ok(image)
    }

    fn describe(&self) -> String {
        format!("Clamp([{}, {}])", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

/// Affine normalization `(x - loc) / scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    loc: f32,
    scale: f32,
}

impl Normalize {
    /// Normalize with centre `loc` and spread `scale`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::DegenerateScale`] if `scale` is zero or not
    /// finite, or if `loc` is not finite.
    pub fn new(loc: f64, scale: f64) -> Result<Self, StatsError> {
        if !loc.is_finite() {
            return Err(StatsError::DegenerateScale { what: "location", value: loc });
        }
        if scale == 0.0 || !scale.is_finite() {
            return Err(StatsError::DegenerateScale { what: "scale", value: scale });
        }
        Ok(Normalize {
            loc: loc as f32,
            scale: scale as f32,
        })
    }

    /// Centre and spread.
    pub fn params(&self) -> (f32, f32) {
        (self.loc, self.scale)
    }
}

impl ImageTransform for Normalize {
    fn apply(&self, mut image: Array3<f32>) -> Result<Array3<f32>, DatasetError> {
        image.mapv_inplace(|v| (v - self.loc) / self.scale);
        Ok(image)
    }

    fn describe(&self) -> String {
        format!("Normalize(loc={}, scale={})", self.loc, self.scale)
    }
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

/// Applies a list of transforms in order.
#[derive(Clone, Default)]
pub struct Compose {
    transforms: Vec<Arc<dyn ImageTransform>>,
}

impl Compose {
    /// Compose `transforms`, first element applied first.
    pub fn new(transforms: Vec<Arc<dyn ImageTransform>>) -> Self {
        Compose { transforms }
    }

    /// Append a transform.
    pub fn then(mut self, transform: Arc<dyn ImageTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Number of composed transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// `true` when no transform is composed.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl ImageTransform for Compose {
    fn apply(&self, image: Array3<f32>) -> Result<Array3<f32>, DatasetError> {
        self.transforms.iter().try_fold(image, |img, t| t.apply(img))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.transforms.iter().map(|t| t.describe()).collect();
        format!("Compose[{}]", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// TransformDataset
// ---------------------------------------------------------------------------

/// Decorates a dataset with an image transform applied on every `get`.
///
/// Targets pass through unchanged.
pub struct TransformDataset {
    inner: SharedDataset,
    transform: Arc<dyn ImageTransform>,
    name: String,
}

impl TransformDataset {
    /// Wrap `inner` with `transform`.
    pub fn new(inner: SharedDataset, transform: Arc<dyn ImageTransform>) -> Self {
        let name = format!("{} | {}", inner.name(), transform.describe());
        TransformDataset { inner, transform, name }
    }

    /// Wrap and return a shared handle, ready for the next layer.
    pub fn wrap(inner: SharedDataset, transform: Arc<dyn ImageTransform>) -> SharedDataset {
        Arc::new(TransformDataset::new(inner, transform))
    }

    /// The wrapped dataset.
    pub fn inner(&self) -> &SharedDataset {
        &self.inner
    }
}

impl LabeledDataset for TransformDataset {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, idx: usize) -> Result<Sample, DatasetError> {
        let Sample { image, target } = self.inner.get(idx)?;
        Ok(Sample::new(self.transform.apply(image)?, target))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::VecDataset;
    use approx::assert_abs_diff_eq;

    fn pixels(values: &[f32]) -> SharedDataset {
        Arc::new(VecDataset::from_pixels(values, 7))
    }

    #[test]
    fn clamp_clips_both_sides() {
        let clamp = Clamp::symmetric(1.5).unwrap();
        let out = clamp
            .apply(Array3::from_shape_vec((1, 1, 4), vec![-3.0, -1.0, 1.0, 3.0]).unwrap())
            .unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![-1.5, -1.0, 1.0, 1.5]);
    }

    #[test]
    fn clamp_rejects_inverted_bounds() {
        assert!(Clamp::new(1.0, -1.0).is_err());
        assert!(Clamp::new(f32::NAN, 1.0).is_err());
    }

    #[test]
    fn normalize_is_affine() {
        let norm = Normalize::new(2.0, 4.0).unwrap();
        let out = norm
            .apply(Array3::from_shape_vec((1, 1, 3), vec![-2.0, 2.0, 6.0]).unwrap())
            .unwrap();
        assert_abs_diff_eq!(out[[0, 0, 0]], -1.0);
        assert_abs_diff_eq!(out[[0, 0, 1]], 0.0);
        assert_abs_diff_eq!(out[[0, 0, 2]], 1.0);
    }

    #[test]
    fn normalize_rejects_degenerate_scale() {
        assert!(matches!(
            Normalize::new(0.0, 0.0),
            Err(StatsError::DegenerateScale { what: "scale", .. })
        ));
        assert!(Normalize::new(0.0, f64::NAN).is_err());
        assert!(Normalize::new(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn resize_keeps_channels() {
        let resize = Resize::new(4, 6).unwrap();
        let out = resize.apply(Array3::from_elem((2, 9, 3), 1.25)).unwrap();
        assert_eq!(out.dim(), (2, 4, 6));
        assert!(out.iter().all(|&v| (v - 1.25).abs() < 1e-6));
        assert!(Resize::new(0, 4).is_err());
    }

    #[test]
    fn compose_applies_in_order() {
        let compose = Compose::new(vec![
            Arc::new(Clamp::symmetric(1.0).unwrap()),
            Arc::new(Normalize::new(0.0, 0.5).unwrap()),
        ]);
        let out = compose
            .apply(Array3::from_shape_vec((1, 1, 2), vec![5.0, -0.25]).unwrap())
            .unwrap();
        // clamp(5) = 1 then / 0.5
        assert_abs_diff_eq!(out[[0, 0, 0]], 2.0);
        assert_abs_diff_eq!(out[[0, 0, 1]], -0.5);
        assert_eq!(compose.describe(), "Compose[Clamp([-1, 1]), Normalize(loc=0, scale=0.5)]");
    }

    #[test]
    fn wrapping_stacks_without_mutating_inner() {
        let base = pixels(&[4.0, -4.0]);
        let clamped = TransformDataset::wrap(Arc::clone(&base), Arc::new(Clamp::symmetric(2.0).unwrap()));
        let scaled = TransformDataset::wrap(Arc::clone(&clamped), Arc::new(Normalize::new(1.0, 2.0).unwrap()));

        assert_eq!(scaled.len(), 2);
        // Inner layers still see their own values.
        assert_eq!(base.get(0).unwrap().image[[0, 0, 0]], 4.0);
        assert_eq!(clamped.get(0).unwrap().image[[0, 0, 0]], 2.0);
        // (2 - 1) / 2 and (-2 - 1) / 2
        assert_abs_diff_eq!(scaled.get(0).unwrap().image[[0, 0, 0]], 0.5);
        assert_abs_diff_eq!(scaled.get(1).unwrap().image[[0, 0, 0]], -1.5);
        assert_eq!(scaled.get(1).unwrap().target, 7);
    }

    #[test]
    fn wrapped_index_errors_propagate() {
        let wrapped = TransformDataset::wrap(pixels(&[1.0]), Arc::new(Clamp::symmetric(1.0).unwrap()));
        assert!(matches!(
            wrapped.get(1),
            Err(DatasetError::IndexOutOfBounds { idx: 1, len: 1 })
        ));
    }
}
