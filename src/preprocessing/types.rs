//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone)]
pub enum PreprocessingError {
    /// Image layout is not 8-bit grayscale or 8-bit three channel
    InvalidFormat { message: String },
    /// Structuring element with a non-positive dimension
    InvalidKernel { width: i64, height: i64 },
    /// Two images that must be combined have different dimensions
    ShapeMismatch {
        first: (u32, u32),
        second: (u32, u32),
    },
    /// Edge detection, Hough accumulation or rotation failed
    SkewDetection { message: String },
    /// A pipeline stage failed; the underlying cause is attached
    Stage {
        stage: PipelineStage,
        source: Box<PreprocessingError>,
    },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::InvalidFormat { message } => {
                write!(f, "Invalid image format: {}", message)
            }
            PreprocessingError::InvalidKernel { width, height } => {
                write!(
                    f,
                    "Invalid structuring element {}x{}: dimensions must be positive",
                    width, height
                )
            }
            PreprocessingError::ShapeMismatch { first, second } => {
                write!(
                    f,
                    "Images have different shapes: {}x{} vs {}x{}",
                    first.0, first.1, second.0, second.1
                )
            }
            PreprocessingError::SkewDetection { message } => {
                write!(f, "Skew detection failed: {}", message)
            }
            PreprocessingError::Stage { stage, source } => {
                write!(f, "Preprocessing failed during {}: {}", stage, source)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreprocessingError::Stage { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl PreprocessingError {
    /// Wraps an error raised inside a pipeline stage.
    pub fn in_stage(stage: PipelineStage, error: PreprocessingError) -> Self {
        PreprocessingError::Stage {
            stage,
            source: Box::new(error),
        }
    }
}

/// Named stages of the preprocessing pipeline, used for error context and timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    BarcodeCrop,
    ContentCrop,
    GaussianMask,
    OtsuMask,
    Fusion,
    Deskew,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::BarcodeCrop => "barcode_crop",
            PipelineStage::ContentCrop => "content_crop",
            PipelineStage::GaussianMask => "gaussian_mask",
            PipelineStage::OtsuMask => "otsu_mask",
            PipelineStage::Fusion => "fusion",
            PipelineStage::Deskew => "deskew",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologicalOperation {
    /// Opening operation (erosion followed by dilation - removes noise)
    Opening,
    /// Closing operation (dilation followed by erosion - fills gaps)
    Closing,
}

/// Size of a rectangular all-ones kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSize {
    pub width: i64,
    pub height: i64,
}

impl KernelSize {
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// Returns the kernel size as unsigned dimensions, rejecting non-positive values.
    pub fn validated(&self) -> Result<(u32, u32), PreprocessingError> {
        if self.width <= 0 || self.height <= 0 || self.width > u32::MAX as i64 || self.height > u32::MAX as i64 {
            return Err(PreprocessingError::InvalidKernel {
                width: self.width,
                height: self.height,
            });
        }
        Ok((self.width as u32, self.height as u32))
    }
}

impl From<(i64, i64)> for KernelSize {
    fn from((width, height): (i64, i64)) -> Self {
        Self::new(width, height)
    }
}

/// Pair of kernels describing one open or close operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    pub erode: KernelSize,
    pub dilate: KernelSize,
}

impl StructuringElement {
    pub const fn new(erode: KernelSize, dilate: KernelSize) -> Self {
        Self { erode, dilate }
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle containing every point.
    pub fn bounding<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for (x, y) in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }
}

/// One line candidate found in Hough space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnglePeak {
    /// Normal angle of the line in radians, in [-π/2, π/2)
    pub angle: f64,
    /// Signed distance of the line from the image origin in pixels
    pub distance: f64,
    /// Accumulator votes at the peak
    pub votes: u32,
}

/// Parameters of the Hough-based skew correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewConfig {
    /// Standard deviation of the Gaussian smoothing applied before edge detection
    pub sigma: f64,
    /// Maximum number of Hough peaks to consider
    pub num_peaks: usize,
    /// Angular resolution of the Hough accumulator in radians
    pub min_deviation: f64,
    /// Lower bound (radians) for normalized peak angles
    pub min_angle: Option<f64>,
    /// Upper bound (radians) for normalized peak angles
    pub max_angle: Option<f64>,
    /// Normalize into [-π/2, π/2) instead of folding into [-π/4, π/4)
    pub normalize_to_90: bool,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            num_peaks: 5,
            min_deviation: 0.01,
            min_angle: None,
            max_angle: None,
            normalize_to_90: false,
        }
    }
}

impl SkewConfig {
    /// Validate skew configuration
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(PreprocessingError::SkewDetection {
                message: format!("sigma must be positive, got {}", self.sigma),
            });
        }
        if self.num_peaks == 0 {
            return Err(PreprocessingError::SkewDetection {
                message: "num_peaks must be at least 1".to_string(),
            });
        }
        if !(self.min_deviation.is_finite() && self.min_deviation > 0.0) {
            return Err(PreprocessingError::SkewDetection {
                message: format!("min_deviation must be positive, got {}", self.min_deviation),
            });
        }
        if let (Some(min), Some(max)) = (self.min_angle, self.max_angle) {
            if min > max {
                return Err(PreprocessingError::SkewDetection {
                    message: format!("min_angle {} is greater than max_angle {}", min, max),
                });
            }
        }
        Ok(())
    }
}

/// Outcome of barcode localization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeRegion {
    Found(Rect),
    NotFound,
}

/// Outcome of the best-effort barcode crop.
#[derive(Debug, Clone)]
pub enum BarcodeCrop {
    /// A barcode was found and the image was cropped around it
    Cropped { image: DynamicImage, barcode: Rect },
    /// No usable barcode; the original image is passed through
    Uncropped(DynamicImage),
}

impl BarcodeCrop {
    pub fn image(&self) -> &DynamicImage {
        match self {
            BarcodeCrop::Cropped { image, .. } => image,
            BarcodeCrop::Uncropped(image) => image,
        }
    }

    pub fn into_image(self) -> DynamicImage {
        match self {
            BarcodeCrop::Cropped { image, .. } => image,
            BarcodeCrop::Uncropped(image) => image,
        }
    }

    pub fn barcode(&self) -> Option<Rect> {
        match self {
            BarcodeCrop::Cropped { barcode, .. } => Some(*barcode),
            BarcodeCrop::Uncropped(_) => None,
        }
    }
}

/// Result of skew estimation, before any rotation is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SkewEstimate {
    /// Winning normalized angle in radians
    pub angle_radians: f64,
    /// Winning angle converted to degrees, the value handed to the rotation
    pub angle_degrees: f64,
    /// Peaks that survived extraction, strongest first
    pub peaks: Vec<AnglePeak>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_size_validation() {
        assert_eq!(KernelSize::new(3, 2).validated().unwrap(), (3, 2));
        assert!(matches!(
            KernelSize::new(0, 3).validated(),
            Err(PreprocessingError::InvalidKernel { width: 0, height: 3 })
        ));
        assert!(matches!(
            KernelSize::new(3, -1).validated(),
            Err(PreprocessingError::InvalidKernel { .. })
        ));
    }

    #[test]
    fn test_rect_bounding() {
        let rect = Rect::bounding(vec![(4, 7), (10, 2), (6, 9)]).unwrap();
        assert_eq!(rect, Rect::new(4, 2, 7, 8));
        assert!(Rect::bounding(Vec::new()).is_none());
    }

    #[test]
    fn test_skew_config_defaults() {
        let config = SkewConfig::default();
        assert_eq!(config.sigma, 1.0);
        assert_eq!(config.num_peaks, 5);
        assert_eq!(config.min_deviation, 0.01);
        assert!(config.min_angle.is_none());
        assert!(config.max_angle.is_none());
        assert!(!config.normalize_to_90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_skew_config_rejects_invalid_values() {
        let config = SkewConfig {
            num_peaks: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SkewConfig {
            min_deviation: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SkewConfig {
            min_angle: Some(0.5),
            max_angle: Some(0.1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_error_keeps_source() {
        use std::error::Error;

        let inner = PreprocessingError::ShapeMismatch {
            first: (10, 10),
            second: (10, 11),
        };
        let wrapped = PreprocessingError::in_stage(PipelineStage::Fusion, inner);
        assert!(wrapped.to_string().contains("fusion"));
        let source = wrapped.source().expect("stage error should expose its cause");
        assert!(source.to_string().contains("different shapes"));
    }
}
