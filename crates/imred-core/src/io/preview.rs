use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::consts::{PREVIEW_ASINH_SOFTENING, PREVIEW_INTERVAL_PERCENT};
use crate::error::Result;
use crate::stats::nan_percentile;

/// Display stretch for quick-look previews.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewStretch {
    /// Softening `a` of `asinh(x / a) / asinh(1 / a)`.
    pub softening: f32,
    /// Central percentage of finite pixel values mapped to the display range.
    pub percent: f32,
}

impl Default for PreviewStretch {
    fn default() -> Self {
        Self {
            softening: PREVIEW_ASINH_SOFTENING,
            percent: PREVIEW_INTERVAL_PERCENT,
        }
    }
}

impl PreviewStretch {
    /// Display interval `(low, high)` of `data`. `None` without finite pixels.
    pub fn interval(&self, data: &Array2<f32>) -> Option<(f32, f32)> {
        let tail = (100.0 - self.percent.clamp(0.0, 100.0)) / 2.0;
        let finite = || data.iter().copied().filter(|v| v.is_finite());
        let low = nan_percentile(finite(), tail)?;
        let high = nan_percentile(finite(), 100.0 - tail)?;
        Some((low, high))
    }

    /// Stretched value in [0, 1].
    pub fn apply(&self, value: f32, low: f32, high: f32) -> f32 {
        if !value.is_finite() {
            return 0.0;
        }
        let span = high - low;
        let x = if span > 0.0 {
            ((value - low) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (x / self.softening).asinh() / (1.0 / self.softening).asinh()
    }
}

/// Render `data` as an 8-bit grayscale image with row 0 at the bottom.
pub fn render_preview(data: &Array2<f32>, stretch: &PreviewStretch) -> GrayImage {
    let (h, w) = data.dim();
    let (low, high) = stretch.interval(data).unwrap_or((0.0, 0.0));

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        let y = (h - 1 - row) as u32;
        for col in 0..w {
            let v = stretch.apply(data[[row, col]], low, high);
            img.put_pixel(col as u32, y, Luma([(v * 255.0).round() as u8]));
        }
    }
    img
}

/// Save a stretched preview, choosing the format from the file extension
/// (PNG when unknown).
pub fn save_preview(data: &Array2<f32>, path: &Path) -> Result<()> {
    let img = render_preview(data, &PreviewStretch::default());
    let format = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => ImageFormat::Jpeg,
        Some("tif" | "tiff") => ImageFormat::Tiff,
        _ => ImageFormat::Png,
    };
    img.save_with_format(path, format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretch_endpoints() {
        let s = PreviewStretch::default();
        assert_eq!(s.apply(0.0, 0.0, 10.0), 0.0);
        assert!((s.apply(10.0, 0.0, 10.0) - 1.0).abs() < 1e-6);
        assert_eq!(s.apply(f32::NAN, 0.0, 10.0), 0.0);
    }

    #[test]
    fn test_preview_origin_is_bottom_left() {
        let mut data = Array2::<f32>::zeros((4, 3));
        data[[0, 0]] = 100.0;
        let img = render_preview(&data, &PreviewStretch { softening: 0.05, percent: 100.0 });
        assert_eq!(img.get_pixel(0, 3).0[0], 255);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
    }
}
