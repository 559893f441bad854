//! Image transform provider.
//!
//! The item pipeline only sequences stages; every pixel operation goes through
//! an [`ImageTransformer`]. [`RasterTransformer`] is the default provider,
//! backed by the `image` and `imageproc` crates.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use thiserror::Error;

/// Lower hysteresis threshold for edge extraction.
pub const EDGE_LOW_THRESHOLD: f32 = 50.0;

/// Upper hysteresis threshold for edge extraction.
pub const EDGE_HIGH_THRESHOLD: f32 = 150.0;

/// Errors reported by a transform provider.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Could not read image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Could not write image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image size mismatch: {left:?} vs {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Pixel-level operations consumed by the image pipeline.
pub trait ImageTransformer: Send + Sync {
    /// Read an image from disk.
    fn decode(&self, path: &Path) -> Result<DynamicImage>;

    /// Gaussian blur with a square kernel of `kernel_size`.
    fn blur(&self, image: &DynamicImage, kernel_size: i32) -> Result<DynamicImage>;

    /// Per-channel `alpha * value + beta`, saturated to the pixel range.
    fn adjust_contrast(&self, image: &DynamicImage, alpha: f64, beta: f64) -> Result<DynamicImage>;

    /// Binary edge mask using hysteresis thresholds.
    fn detect_edges(&self, image: &DynamicImage, low: f32, high: f32) -> Result<DynamicImage>;

    /// Weighted sum `a * weight_a + b * weight_b`, saturated.
    fn blend(
        &self,
        a: &DynamicImage,
        b: &DynamicImage,
        weight_a: f64,
        weight_b: f64,
    ) -> Result<DynamicImage>;

    /// Write an image; the format follows the path's extension.
    fn encode(&self, image: &DynamicImage, path: &Path) -> Result<()>;
}

/// Default provider operating on 8-bit RGB images.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterTransformer;

/// Standard deviation matching a Gaussian kernel of the given size.
fn kernel_sigma(kernel_size: i32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[inline]
fn saturate(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

impl ImageTransformer for RasterTransformer {
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|e| TransformError::Decode {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn blur(&self, image: &DynamicImage, kernel_size: i32) -> Result<DynamicImage> {
        let rgb = image.to_rgb8();
        if kernel_size <= 1 {
            return Ok(DynamicImage::ImageRgb8(rgb));
        }
        let blurred = gaussian_blur_f32(&rgb, kernel_sigma(kernel_size));
        Ok(DynamicImage::ImageRgb8(blurred))
    }

    fn adjust_contrast(&self, image: &DynamicImage, alpha: f64, beta: f64) -> Result<DynamicImage> {
        let mut rgb = image.to_rgb8();
        for pixel in rgb.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = saturate(alpha * f64::from(*channel) + beta);
            }
        }
        Ok(DynamicImage::ImageRgb8(rgb))
    }

    fn detect_edges(&self, image: &DynamicImage, low: f32, high: f32) -> Result<DynamicImage> {
        let gray: GrayImage = image.to_luma8();
        Ok(DynamicImage::ImageLuma8(canny(&gray, low, high)))
    }

    fn blend(
        &self,
        a: &DynamicImage,
        b: &DynamicImage,
        weight_a: f64,
        weight_b: f64,
    ) -> Result<DynamicImage> {
        let a = a.to_rgb8();
        let b = b.to_rgb8();
        if a.dimensions() != b.dimensions() {
            return Err(TransformError::DimensionMismatch {
                left: a.dimensions(),
                right: b.dimensions(),
            });
        }

        let blended = RgbImage::from_fn(a.width(), a.height(), |x, y| {
            let pa = a.get_pixel(x, y).0;
            let pb = b.get_pixel(x, y).0;
            Rgb([
                saturate(f64::from(pa[0]) * weight_a + f64::from(pb[0]) * weight_b),
                saturate(f64::from(pa[1]) * weight_a + f64::from(pb[1]) * weight_b),
                saturate(f64::from(pa[2]) * weight_a + f64::from(pb[2]) * weight_b),
            ])
        });
        Ok(DynamicImage::ImageRgb8(blended))
    }

    fn encode(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        image.save(path).map_err(|e| TransformError::Encode {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
