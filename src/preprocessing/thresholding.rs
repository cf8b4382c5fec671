//! # Image Thresholding Module
//!
//! Binary thresholding for receipt preprocessing: the fixed zero threshold used
//! to re-binarize fused masks, adaptive Gaussian and mean thresholding, and
//! Otsu's global method.

use image::{DynamicImage, GrayImage, Luma};
use tracing;

use super::color::{require_grayscale, to_grayscale};
use super::filtering::{
    box_kernel, convolve_separable, gaussian_blur_5x5, gaussian_kernel, median_blur, to_plane,
    BorderMode,
};
use super::types::PreprocessingError;

/// Side of the square neighborhood used by adaptive thresholding.
pub const ADAPTIVE_BLOCK_SIZE: usize = 41;
/// Constant subtracted from the local mean to form the adaptive threshold.
pub const ADAPTIVE_WEIGHT: i32 = 11;
/// Median blur applied before adaptive thresholding.
pub const MEDIAN_BLUR_SIZE: u32 = 5;
// Interpolated samples above mid-gray count as white.
const SNAP_THRESHOLD: u8 = 127;

/// Local statistic used by adaptive thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveMethod {
    /// Gaussian-weighted neighborhood mean
    Gaussian,
    /// Unweighted neighborhood mean
    Mean,
}

/// Maps every non-zero sample of a grayscale image to 255.
///
/// Used on intermediate continuous-valued outputs such as averaged masks.
/// Only single-channel input is accepted.
pub fn to_binary(image: &DynamicImage) -> Result<GrayImage, PreprocessingError> {
    let gray = require_grayscale(image)?;
    Ok(binarize_nonzero(gray))
}

pub(crate) fn binarize_nonzero(gray: &GrayImage) -> GrayImage {
    apply_threshold(gray, 0)
}

/// Snaps interpolated samples back to 0 or 255 at mid-gray.
///
/// The deskew rotation blends pixels along edges it crosses; binary-only
/// consumers such as the JSON encoding need those samples resolved first.
pub fn snap_to_binary(gray: &GrayImage) -> GrayImage {
    apply_threshold(gray, SNAP_THRESHOLD)
}

/// Samples strictly above `threshold` become 255, the rest 0.
pub fn apply_threshold(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (out, pixel) in binary.pixels_mut().zip(gray.pixels()) {
        *out = Luma([if pixel[0] > threshold { 255 } else { 0 }]);
    }
    binary
}

/// Adaptive threshold with a Gaussian-weighted 41×41 neighborhood.
///
/// The image is converted to grayscale and median-blurred (5×5) first. A pixel
/// becomes white when it lies above its local threshold (weighted mean − 11),
/// so dark text ends up black on a white background.
pub fn gaussian_mask(image: &DynamicImage) -> Result<GrayImage, PreprocessingError> {
    adaptive_mask(image, AdaptiveMethod::Gaussian)
}

/// Adaptive threshold with an unweighted 41×41 neighborhood mean.
pub fn mean_mask(image: &DynamicImage) -> Result<GrayImage, PreprocessingError> {
    adaptive_mask(image, AdaptiveMethod::Mean)
}

fn adaptive_mask(
    image: &DynamicImage,
    method: AdaptiveMethod,
) -> Result<GrayImage, PreprocessingError> {
    let gray = to_grayscale(image)?;
    let blurred = median_blur(&gray, MEDIAN_BLUR_SIZE);
    let mask = adaptive_threshold(&blurred, method);

    tracing::debug!(
        target: "receipt_preprocessing",
        method = ?method,
        width = mask.width(),
        height = mask.height(),
        "Adaptive threshold applied"
    );

    Ok(mask)
}

/// Adaptive thresholding of an already grayscale image (no pre-blur).
pub fn adaptive_threshold(gray: &GrayImage, method: AdaptiveMethod) -> GrayImage {
    let (width, height) = gray.dimensions();
    let kernel = match method {
        AdaptiveMethod::Gaussian => gaussian_kernel(ADAPTIVE_BLOCK_SIZE, None),
        AdaptiveMethod::Mean => box_kernel(ADAPTIVE_BLOCK_SIZE),
    };
    let local_means = convolve_separable(
        &to_plane(gray),
        width as usize,
        height as usize,
        &kernel,
        &kernel,
        BorderMode::Replicate,
    );

    let mut binary = GrayImage::new(width, height);
    for ((out, pixel), mean) in binary.pixels_mut().zip(gray.pixels()).zip(local_means) {
        let local_threshold = mean.round().clamp(0.0, 255.0) as i32 - ADAPTIVE_WEIGHT;
        *out = Luma([if pixel[0] as i32 > local_threshold { 255 } else { 0 }]);
    }
    binary
}

/// Otsu binarization after a 5×5 Gaussian blur.
pub fn otsu_mask(image: &DynamicImage) -> Result<GrayImage, PreprocessingError> {
    let gray = to_grayscale(image)?;
    let blurred = gaussian_blur_5x5(&gray);
    let threshold = otsu_threshold(&blurred);

    tracing::debug!(
        target: "receipt_preprocessing",
        threshold,
        width = blurred.width(),
        height = blurred.height(),
        "Otsu threshold applied"
    );

    Ok(apply_threshold(&blurred, threshold))
}

/// Computes Otsu's global threshold for a grayscale image.
///
/// Returns 0 for empty images and for images whose histogram never splits
/// into two populated classes.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u32; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let total_pixels = (gray.width() as f64) * (gray.height() as f64);
    if total_pixels == 0.0 {
        return 0;
    }
    find_otsu_threshold(&histogram, total_pixels)
}

/// Finds the optimal threshold using Otsu's method by maximizing between-class variance.
///
/// Class 0 holds intensities `<= threshold`. Only a strictly greater variance
/// replaces the current best, so ties resolve to the lowest threshold.
pub(crate) fn find_otsu_threshold(histogram: &[u32; 256], total_pixels: f64) -> u8 {
    // Pre-calculate cumulative statistics
    let mut cumulative_sums = [0f64; 256];
    let mut cumulative_weighted_sums = [0f64; 256];
    let mut cumulative_sum = 0f64;
    let mut cumulative_weighted_sum = 0f64;

    for (i, count) in histogram.iter().enumerate() {
        let pixel_count = *count as f64;
        cumulative_sum += pixel_count;
        cumulative_weighted_sum += (i as f64) * pixel_count;
        cumulative_sums[i] = cumulative_sum;
        cumulative_weighted_sums[i] = cumulative_weighted_sum;
    }

    let total_weighted_sum = cumulative_weighted_sums[255];
    let mut max_variance = 0f64;
    let mut optimal_threshold = 0u8;

    for threshold in 0..256usize {
        let w0 = cumulative_sums[threshold] / total_pixels;
        let w1 = 1.0 - w0;

        if w0 < f64::from(f32::EPSILON) || w1 < f64::from(f32::EPSILON) {
            continue;
        }

        let mu0 = cumulative_weighted_sums[threshold] / cumulative_sums[threshold];
        let mu1 = (total_weighted_sum - cumulative_weighted_sums[threshold])
            / (total_pixels - cumulative_sums[threshold]);

        let variance = w0 * w1 * (mu0 - mu1).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}
