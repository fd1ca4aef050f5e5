//! Bilinear image resampling.
//!
//! Pixel centres are aligned at half-integer positions (the
//! `align_corners = false` convention): output pixel `k` samples the source
//! at `(k + 0.5) * src / dst - 0.5`, clamped to the valid range. No
//! antialiasing filter is applied when downsampling.
//!
//! # Example
//!
//! ```rust
//! use bearing_signal::resize_bilinear;
//! use ndarray::Array2;
//!
//! let image = Array2::<f32>::zeros((129, 33));
//! let resized = resize_bilinear(image.view(), 64, 64).unwrap();
//! assert_eq!(resized.dim(), (64, 64));
//! ```

use ndarray::{Array2, ArrayView2};

use crate::{Result, SignalError};

/// Resize a 2-D image to `height x width` with separable bilinear
/// interpolation (rows first, then columns).
pub fn resize_bilinear(image: ArrayView2<'_, f32>, height: usize, width: usize) -> Result<Array2<f32>> {
    let (src_h, src_w) = image.dim();
    if src_h == 0 || src_w == 0 {
        return Err(SignalError::EmptyImage {
            height: src_h,
            width: src_w,
        });
    }
    if height == 0 || width == 0 {
        return Err(SignalError::InvalidTargetSize { height, width });
    }

    let row_weights = interp_weights(src_h, height);
    let col_weights = interp_weights(src_w, width);

    // Pass 1: resample along the row axis → [height, src_w].
    let mut rows = Array2::<f32>::zeros((height, src_w));
    for (r, &(i0, i1, w)) in row_weights.iter().enumerate() {
        for c in 0..src_w {
            rows[[r, c]] = lerp(image[[i0, c]], image[[i1, c]], w);
        }
    }

    // Pass 2: resample along the column axis → [height, width].
    let mut out = Array2::<f32>::zeros((height, width));
    for r in 0..height {
        for (c, &(j0, j1, w)) in col_weights.iter().enumerate() {
            out[[r, c]] = lerp(rows[[r, j0]], rows[[r, j1]], w);
        }
    }

    Ok(out)
}

/// Compute source indices and fractional weights for resampling an axis of
/// `src_n` samples to `dst_n` samples.
///
/// Returns one `(i0, i1, frac)` tuple per output sample; the output value is
/// `src[i0] * (1 - frac) + src[i1] * frac`.
///
/// # Panics
///
/// Panics if `src_n == 0` or `dst_n == 0`.
pub fn interp_weights(src_n: usize, dst_n: usize) -> Vec<(usize, usize, f32)> {
    assert!(src_n > 0, "src_n must be > 0");
    assert!(dst_n > 0, "dst_n must be > 0");

    let scale = src_n as f64 / dst_n as f64;
    (0..dst_n)
        .map(|k| {
            let pos = ((k as f64 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (pos.floor() as usize).min(src_n - 1);
            let i1 = (i0 + 1).min(src_n - 1);
            let frac = if i1 == i0 { 0.0 } else { (pos - i0 as f64) as f32 };
            (i0, i1, frac)
        })
        .collect()
}

/// Linear blend that never touches `b` when `w == 0`, so non-finite
/// neighbours do not leak into exact samples.
#[inline]
fn lerp(a: f32, b: f32, w: f32) -> f32 {
    if w == 0.0 {
        a
    } else {
        a * (1.0 - w) + b * w
    }
}
