//! # Mask Fusion
//!
//! Combines two binary masks produced by different thresholding strategies so
//! that artifacts specific to one strategy cancel out.

use image::{DynamicImage, GrayImage, Luma};

use super::thresholding::to_binary;
use super::types::PreprocessingError;

/// Averages two masks and re-binarizes the result.
///
/// The average goes through [`saturating_average`]; with the zero threshold
/// that follows, a pixel ends up black only when it is black in both inputs.
pub fn average_and_binarize(
    first: &GrayImage,
    second: &GrayImage,
) -> Result<GrayImage, PreprocessingError> {
    let averaged = saturating_average(first, second)?;
    to_binary(&DynamicImage::ImageLuma8(averaged))
}

/// Pixelwise `saturating_add(a, b) / 2`, truncating.
///
/// Sums above 255 clip before halving, so two white pixels average to 127
/// rather than 255.
pub fn saturating_average(
    first: &GrayImage,
    second: &GrayImage,
) -> Result<GrayImage, PreprocessingError> {
    if first.dimensions() != second.dimensions() {
        return Err(PreprocessingError::ShapeMismatch {
            first: first.dimensions(),
            second: second.dimensions(),
        });
    }

    let mut averaged = GrayImage::new(first.width(), first.height());
    for ((out, a), b) in averaged.pixels_mut().zip(first.pixels()).zip(second.pixels()) {
        *out = Luma([a[0].saturating_add(b[0]) / 2]);
    }
    Ok(averaged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_average_clips_before_halving() {
        let a = GrayImage::from_raw(4, 1, vec![255, 200, 0, 0]).unwrap();
        let b = GrayImage::from_raw(4, 1, vec![255, 100, 255, 0]).unwrap();
        let averaged = saturating_average(&a, &b).unwrap();
        assert_eq!(averaged.as_raw(), &vec![127, 127, 127, 0]);
    }

    #[test]
    fn test_fusion_is_black_only_where_both_are_black() {
        let a = GrayImage::from_raw(4, 1, vec![0, 0, 255, 255]).unwrap();
        let b = GrayImage::from_raw(4, 1, vec![0, 255, 0, 255]).unwrap();
        let fused = average_and_binarize(&a, &b).unwrap();
        assert_eq!(fused.as_raw(), &vec![0, 255, 255, 255]);
    }

    #[test]
    fn test_shape_mismatch_width() {
        let a = GrayImage::new(4, 3);
        let b = GrayImage::new(5, 3);
        assert!(matches!(
            average_and_binarize(&a, &b),
            Err(PreprocessingError::ShapeMismatch {
                first: (4, 3),
                second: (5, 3)
            })
        ));
    }

    #[test]
    fn test_shape_mismatch_height() {
        let a = GrayImage::new(4, 3);
        let b = GrayImage::new(4, 2);
        assert!(average_and_binarize(&a, &b).is_err());
    }
}
