//! # Image Preprocessing Module
//!
//! This module turns a photographed receipt into a clean, deskewed binary image
//! ready for text recognition.
//!
//! The module is organized into focused sub-modules:
//! - `color`: Grayscale conversion
//! - `filtering`: Median and Gaussian smoothing, separable convolution
//! - `thresholding`: Adaptive and Otsu binarization
//! - `morphology`: Erosion, dilation, opening and closing
//! - `fusion`: Combining two binary masks
//! - `cropping`: Barcode localization and content cropping
//! - `deskewing`: Hough-based skew estimation and rotation
//! - `pipeline`: The end-to-end preprocessing flow
//! - `types`: Shared types and error definitions

pub mod color;
pub mod cropping;
pub mod deskewing;
pub mod filtering;
pub mod fusion;
pub mod morphology;
pub mod pipeline;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    AnglePeak, BarcodeCrop, BarcodeRegion, KernelSize, MorphologicalOperation, PipelineStage,
    PreprocessingError, Rect, SkewConfig, SkewEstimate, StructuringElement,
};

// Re-export main functions from sub-modules
pub use color::to_grayscale;
pub use cropping::{crop_to_content, detect_barcode, locate_barcode};
pub use deskewing::{correct_skew, estimate_skew};
pub use fusion::average_and_binarize;
pub use morphology::{close, open};
pub use pipeline::{preprocess, Preprocessor};
pub use thresholding::{gaussian_mask, mean_mask, otsu_mask, snap_to_binary, to_binary};
