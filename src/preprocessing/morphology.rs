//! # Morphological Operations
//!
//! Erosion, dilation, opening and closing with rectangular all-ones
//! structuring elements. A rectangle's min/max factorizes into a horizontal
//! pass followed by a vertical pass, which keeps large kernels affordable.
//!
//! The window for a kernel dimension `k` spans offsets `-(k/2) ..= k-1-(k/2)`
//! around the anchor. Samples outside the image are skipped, so the border
//! never darkens an erosion nor brightens a dilation.

use image::GrayImage;
use tracing;

use super::types::{KernelSize, MorphologicalOperation, PreprocessingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Min,
    Max,
}

/// Erodes an image with a rectangular kernel (window minimum).
pub fn erode(image: &GrayImage, kernel: KernelSize) -> Result<GrayImage, PreprocessingError> {
    let (width, height) = kernel.validated()?;
    Ok(reduce_rect(image, width, height, Reduction::Min))
}

/// Dilates an image with a rectangular kernel (window maximum).
pub fn dilate(image: &GrayImage, kernel: KernelSize) -> Result<GrayImage, PreprocessingError> {
    let (width, height) = kernel.validated()?;
    Ok(reduce_rect(image, width, height, Reduction::Max))
}

/// Opening: erosion with `erode_size`, then dilation with `dilate_size`.
///
/// Removes speckle noise smaller than the erosion kernel. Both kernels are
/// validated before any work is done.
///
/// # Examples
///
/// ```
/// use image::{GrayImage, Luma};
/// use receipt_reader::preprocessing::morphology::open;
/// use receipt_reader::preprocessing::KernelSize;
///
/// let mut img = GrayImage::new(9, 9);
/// img.put_pixel(4, 4, Luma([255]));
/// let opened = open(&img, KernelSize::new(3, 3), KernelSize::new(2, 2)).unwrap();
/// assert_eq!(opened.get_pixel(4, 4)[0], 0);
/// ```
pub fn open(
    image: &GrayImage,
    erode_size: KernelSize,
    dilate_size: KernelSize,
) -> Result<GrayImage, PreprocessingError> {
    apply_morphology(image, MorphologicalOperation::Opening, erode_size, dilate_size)
}

/// Closing: dilation with `dilate_size`, then erosion with `erode_size`.
pub fn close(
    image: &GrayImage,
    erode_size: KernelSize,
    dilate_size: KernelSize,
) -> Result<GrayImage, PreprocessingError> {
    apply_morphology(image, MorphologicalOperation::Closing, erode_size, dilate_size)
}

fn apply_morphology(
    image: &GrayImage,
    operation: MorphologicalOperation,
    erode_size: KernelSize,
    dilate_size: KernelSize,
) -> Result<GrayImage, PreprocessingError> {
    let (erode_w, erode_h) = erode_size.validated()?;
    let (dilate_w, dilate_h) = dilate_size.validated()?;

    let processed = match operation {
        MorphologicalOperation::Opening => {
            let eroded = reduce_rect(image, erode_w, erode_h, Reduction::Min);
            reduce_rect(&eroded, dilate_w, dilate_h, Reduction::Max)
        }
        MorphologicalOperation::Closing => {
            let dilated = reduce_rect(image, dilate_w, dilate_h, Reduction::Max);
            reduce_rect(&dilated, erode_w, erode_h, Reduction::Min)
        }
    };

    tracing::trace!(
        target: "receipt_preprocessing",
        operation = ?operation,
        erode = ?(erode_w, erode_h),
        dilate = ?(dilate_w, dilate_h),
        "Morphological operation applied"
    );

    Ok(processed)
}

fn reduce_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32, reduction: Reduction) -> GrayImage {
    if kernel_w == 1 && kernel_h == 1 {
        return image.clone();
    }
    let horizontal = reduce_axis(image, kernel_w, reduction, true);
    reduce_axis(&horizontal, kernel_h, reduction, false)
}

/// One-dimensional min/max over a window along rows or columns.
fn reduce_axis(image: &GrayImage, ksize: u32, reduction: Reduction, along_x: bool) -> GrayImage {
    let (width, height) = image.dimensions();
    if ksize == 1 {
        return image.clone();
    }

    let anchor = (ksize / 2) as i64;
    let start = -anchor;
    let end = ksize as i64 - 1 - anchor;
    let len = if along_x { width } else { height } as i64;

    let mut result = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let pos = if along_x { x } else { y } as i64;
            let lo = (pos + start).max(0);
            let hi = (pos + end).min(len - 1);

            let mut acc = match reduction {
                Reduction::Min => u8::MAX,
                Reduction::Max => u8::MIN,
            };
            for offset in lo..=hi {
                let (sx, sy) = if along_x {
                    (offset as u32, y)
                } else {
                    (x, offset as u32)
                };
                let value = image.get_pixel(sx, sy)[0];
                acc = match reduction {
                    Reduction::Min => acc.min(value),
                    Reduction::Max => acc.max(value),
                };
            }
            result.put_pixel(x, y, image::Luma([acc]));
        }
    }

    result
}
