//! # Preprocessing Pipeline
//!
//! Chains the individual stages into the fixed receipt preprocessing flow:
//! barcode crop, content crop, two independent binarizations, mask fusion
//! and skew correction.

use image::{DynamicImage, GrayImage};
use std::time::Instant;
use tracing;

use super::cropping::{crop_to_content, detect_barcode};
use super::deskewing::correct_skew;
use super::fusion::average_and_binarize;
use super::morphology::open;
use super::thresholding::{gaussian_mask, otsu_mask};
use super::types::{KernelSize, PipelineStage, PreprocessingError, SkewConfig, StructuringElement};
use crate::observability;

/// Opening applied to each thresholded mask before fusion.
pub const MASK_OPENING: StructuringElement =
    StructuringElement::new(KernelSize::new(3, 3), KernelSize::new(2, 2));

/// Opening applied to the fused mask.
pub const FUSED_OPENING: StructuringElement =
    StructuringElement::new(KernelSize::new(2, 2), KernelSize::new(2, 2));

/// Receipt preprocessor holding the skew detection settings.
///
/// The struct carries only immutable configuration, so one instance can be
/// shared across threads and reused for any number of images.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    skew: SkewConfig,
}

impl Preprocessor {
    /// Creates a preprocessor with the default skew settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use receipt_reader::preprocessing::Preprocessor;
    ///
    /// let preprocessor = Preprocessor::new();
    /// assert_eq!(preprocessor.skew_config().num_peaks, 5);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a preprocessor with custom skew settings.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::SkewDetection` if the settings are invalid.
    pub fn with_skew_config(skew: SkewConfig) -> Result<Self, PreprocessingError> {
        skew.validate()?;
        Ok(Self { skew })
    }

    pub fn skew_config(&self) -> &SkewConfig {
        &self.skew
    }

    /// Runs the full pipeline on an 8-bit grayscale or RGB image.
    ///
    /// The result is a binary image except for the interpolated pixels that
    /// the final rotation introduces along rotated edges.
    ///
    /// # Errors
    ///
    /// Barcode detection never fails the pipeline. Any other stage failure is
    /// returned as `PreprocessingError::Stage` naming the stage and keeping
    /// the underlying error as its source.
    ///
    /// # Examples
    ///
    /// ```
    /// use image::{DynamicImage, GrayImage, Luma};
    /// use receipt_reader::preprocessing::Preprocessor;
    ///
    /// let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 80, Luma([255])));
    /// let processed = Preprocessor::new().preprocess(&page).unwrap();
    /// assert_eq!((processed.width(), processed.height()), (120, 80));
    /// ```
    pub fn preprocess(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
        let start_time = Instant::now();
        let result = self.run_stages(image);
        let duration = start_time.elapsed();

        observability::record_preprocessing_metrics(duration, result.is_ok());

        match &result {
            Ok(processed) => tracing::debug!(
                target: "receipt_preprocessing",
                input_width = image.width(),
                input_height = image.height(),
                output_width = processed.width(),
                output_height = processed.height(),
                duration_ms = duration.as_millis() as u64,
                "Preprocessing completed"
            ),
            Err(e) => tracing::warn!(
                target: "receipt_preprocessing",
                error = %e,
                duration_ms = duration.as_millis() as u64,
                "Preprocessing failed"
            ),
        }

        result
    }

    fn run_stages(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
        let barcode = run_stage(PipelineStage::BarcodeCrop, || Ok(detect_barcode(image)))?;
        let cropped = run_stage(PipelineStage::ContentCrop, || {
            crop_to_content(barcode.image())
        })?;

        let gaussian = run_stage(PipelineStage::GaussianMask, || {
            open_with(&gaussian_mask(&cropped)?, MASK_OPENING)
        })?;
        let otsu = run_stage(PipelineStage::OtsuMask, || {
            open_with(&otsu_mask(&cropped)?, MASK_OPENING)
        })?;

        let fused = run_stage(PipelineStage::Fusion, || {
            open_with(&average_and_binarize(&otsu, &gaussian)?, FUSED_OPENING)
        })?;

        run_stage(PipelineStage::Deskew, || {
            correct_skew(&DynamicImage::ImageLuma8(fused), &self.skew)
        })
    }
}

/// Runs the pipeline with default settings.
pub fn preprocess(image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
    Preprocessor::default().preprocess(image)
}

fn open_with(
    mask: &GrayImage,
    element: StructuringElement,
) -> Result<GrayImage, PreprocessingError> {
    open(mask, element.erode, element.dilate)
}

fn run_stage<T, F>(stage: PipelineStage, operation: F) -> Result<T, PreprocessingError>
where
    F: FnOnce() -> Result<T, PreprocessingError>,
{
    let start_time = Instant::now();
    let result = operation().map_err(|e| PreprocessingError::in_stage(stage, e));
    let elapsed = start_time.elapsed();

    observability::record_stage_duration(stage.as_str(), elapsed);
    tracing::debug!(
        target: "receipt_preprocessing",
        stage = stage.as_str(),
        elapsed_ms = elapsed.as_millis() as u64,
        success = result.is_ok(),
        "Pipeline stage finished"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage, RgbaImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn is_binary(image: &DynamicImage) -> bool {
        image.to_luma8().pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn test_blank_page_stays_white() {
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 80, Rgb([255, 255, 255])));
        let processed = preprocess(&page).unwrap();
        assert_eq!((processed.width(), processed.height()), (100, 80));
        assert!(processed.to_luma8().pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_axis_aligned_blocks_yield_binary_output() {
        let mut page = GrayImage::from_pixel(160, 120, Luma([255]));
        draw_filled_rect_mut(&mut page, Rect::at(20, 30).of_size(120, 12), Luma([0]));
        draw_filled_rect_mut(&mut page, Rect::at(20, 70).of_size(90, 12), Luma([0]));
        let processed = preprocess(&DynamicImage::ImageLuma8(page)).unwrap();
        assert!(is_binary(&processed));
    }

    #[test]
    fn test_alpha_input_fails_in_content_crop() {
        let page = DynamicImage::ImageRgba8(RgbaImage::new(40, 40));
        match preprocess(&page) {
            Err(PreprocessingError::Stage { stage, source }) => {
                assert_eq!(stage, PipelineStage::ContentCrop);
                assert!(matches!(*source, PreprocessingError::InvalidFormat { .. }));
            }
            other => panic!("expected stage error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_skew_config_rejected() {
        let config = SkewConfig {
            sigma: 0.0,
            ..Default::default()
        };
        assert!(Preprocessor::with_skew_config(config).is_err());
    }

    #[test]
    fn test_structuring_elements() {
        assert_eq!(MASK_OPENING.erode, KernelSize::new(3, 3));
        assert_eq!(MASK_OPENING.dilate, KernelSize::new(2, 2));
        assert_eq!(FUSED_OPENING.erode, KernelSize::new(2, 2));
        assert_eq!(FUSED_OPENING.dilate, KernelSize::new(2, 2));
    }
}
