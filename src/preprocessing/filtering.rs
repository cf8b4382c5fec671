//! # Image Filtering Module
//!
//! Noise reduction and separable convolution helpers shared by thresholding,
//! region location and skew estimation. Border handling is explicit so every
//! filter has fully specified behavior at the image edges.

use image::GrayImage;
use imageproc::filter::median_filter;

/// How samples outside the image are synthesized during convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    /// Repeat the nearest edge sample (`aaa|abcd|ddd`)
    Replicate,
    /// Mirror without repeating the edge sample (`dcb|abcd|cba`)
    Reflect101,
}

/// Maps a possibly out-of-range coordinate into `0..len`.
pub(crate) fn border_index(index: i64, len: usize, mode: BorderMode) -> usize {
    let n = len as i64;
    match mode {
        BorderMode::Replicate => index.clamp(0, n - 1) as usize,
        BorderMode::Reflect101 => {
            if n == 1 {
                return 0;
            }
            let period = 2 * (n - 1);
            let mut folded = index.rem_euclid(period);
            if folded >= n {
                folded = period - folded;
            }
            folded as usize
        }
    }
}

/// Applies a square median filter of odd size `ksize` (5 gives a 5×5 window).
pub fn median_blur(image: &GrayImage, ksize: u32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let radius = ksize / 2;
    median_filter(image, radius, radius)
}

/// Gaussian sigma used when only a kernel size is given.
pub fn sigma_for_kernel_size(ksize: usize) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian kernel of the given odd size.
///
/// Sizes up to 7 with automatic sigma use the fixed binomial tables so that
/// a 5-tap kernel is exactly `[1, 4, 6, 4, 1] / 16`.
pub fn gaussian_kernel(ksize: usize, sigma: Option<f64>) -> Vec<f64> {
    if sigma.is_none() {
        let fixed: Option<&[f64]> = match ksize {
            1 => Some(&[1.0]),
            3 => Some(&[0.25, 0.5, 0.25]),
            5 => Some(&[0.0625, 0.25, 0.375, 0.25, 0.0625]),
            7 => Some(&[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125]),
            _ => None,
        };
        if let Some(kernel) = fixed {
            return kernel.to_vec();
        }
    }

    let sigma = sigma.unwrap_or_else(|| sigma_for_kernel_size(ksize));
    let center = (ksize / 2) as f64;
    let scale = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for value in &mut kernel {
        *value /= sum;
    }
    kernel
}

/// Gaussian kernel sized from sigma, truncated at four standard deviations.
pub fn gaussian_kernel_for_sigma(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    gaussian_kernel(2 * radius + 1, Some(sigma))
}

/// Normalized box (mean) kernel.
pub fn box_kernel(ksize: usize) -> Vec<f64> {
    vec![1.0 / ksize as f64; ksize]
}

/// Converts a grayscale image into a row-major plane of floating point samples.
pub fn to_plane(image: &GrayImage) -> Vec<f64> {
    image.pixels().map(|p| p[0] as f64).collect()
}

/// Convolves a row-major plane with a horizontal then a vertical kernel.
///
/// Both kernels must have odd length; they are centered on the output sample.
pub fn convolve_separable(
    plane: &[f64],
    width: usize,
    height: usize,
    kernel_x: &[f64],
    kernel_y: &[f64],
    border: BorderMode,
) -> Vec<f64> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let rx = (kernel_x.len() / 2) as i64;
    let ry = (kernel_y.len() / 2) as i64;

    let mut horizontal = vec![0.0; width * height];
    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel_x.iter().enumerate() {
                let sx = border_index(x as i64 + k as i64 - rx, width, border);
                acc += weight * row[sx];
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut output = vec![0.0; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel_y.iter().enumerate() {
                let sy = border_index(y as i64 + k as i64 - ry, height, border);
                acc += weight * horizontal[sy * width + x];
            }
            output[y * width + x] = acc;
        }
    }

    output
}

/// Rounds a plane back into an 8-bit image, saturating at the ends of the range.
pub fn plane_to_image(plane: &[f64], width: u32, height: u32) -> GrayImage {
    let data: Vec<u8> = plane
        .iter()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Applies a 5×5 Gaussian blur with automatic sigma and mirrored borders.
pub fn gaussian_blur_5x5(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let kernel = gaussian_kernel(5, None);
    let blurred = convolve_separable(
        &to_plane(image),
        width as usize,
        height as usize,
        &kernel,
        &kernel,
        BorderMode::Reflect101,
    );
    plane_to_image(&blurred, width, height)
}
