//! # Color Space Normalization
//!
//! Converts input images to single-channel grayscale, the precondition for
//! every other preprocessing step.

use image::{DynamicImage, GrayImage, Luma};

use super::types::PreprocessingError;

// BT.601 luma weights in 14-bit fixed point.
const LUMA_SHIFT: u32 = 14;
const LUMA_RED: u32 = 4899;
const LUMA_GREEN: u32 = 9617;
const LUMA_BLUE: u32 = 1868;

/// Converts an image to 8-bit grayscale.
///
/// Single-channel images are returned with their samples untouched, so the
/// conversion is idempotent. Three-channel images use fixed-point BT.601 luma
/// weights. Any other layout (alpha channels, 16-bit or float samples) fails
/// with [`PreprocessingError::InvalidFormat`].
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, RgbImage, Rgb};
/// use receipt_reader::preprocessing::to_grayscale;
///
/// let rgb = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
/// let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb)).unwrap();
/// assert!(gray.pixels().all(|p| p[0] == 255));
/// ```
pub fn to_grayscale(image: &DynamicImage) -> Result<GrayImage, PreprocessingError> {
    match image {
        DynamicImage::ImageLuma8(gray) => Ok(gray.clone()),
        DynamicImage::ImageRgb8(rgb) => {
            let mut gray = GrayImage::new(rgb.width(), rgb.height());
            for (out, pixel) in gray.pixels_mut().zip(rgb.pixels()) {
                let [r, g, b] = pixel.0;
                let luma = (r as u32 * LUMA_RED
                    + g as u32 * LUMA_GREEN
                    + b as u32 * LUMA_BLUE
                    + (1 << (LUMA_SHIFT - 1)))
                    >> LUMA_SHIFT;
                *out = Luma([luma.min(255) as u8]);
            }
            Ok(gray)
        }
        other => Err(PreprocessingError::InvalidFormat {
            message: format!(
                "expected an 8-bit grayscale (1 channel) or color (3 channels) image, got {:?}",
                other.color()
            ),
        }),
    }
}

/// Returns the image as grayscale only if it already is single channel.
pub(crate) fn require_grayscale(image: &DynamicImage) -> Result<&GrayImage, PreprocessingError> {
    match image {
        DynamicImage::ImageLuma8(gray) => Ok(gray),
        other => Err(PreprocessingError::InvalidFormat {
            message: format!(
                "expected a grayscale (1 channel) image for thresholding, got {:?}",
                other.color()
            ),
        }),
    }
}
