//! # Region Location and Cropping
//!
//! Discards margins around the receipt body before binarization:
//! - barcode-aware cropping keeps the area above a footer barcode
//! - content cropping keeps the bounding box of the dominant foreground contour

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::filter::box_filter;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;
use tracing;

use super::color::to_grayscale;
use super::filtering::median_blur;
use super::morphology::{close, open};
use super::thresholding::{apply_threshold, otsu_threshold, MEDIAN_BLUR_SIZE};
use super::types::{BarcodeCrop, BarcodeRegion, KernelSize, PreprocessingError, Rect};

/// Rows kept above the barcode are cut this many pixels before it.
pub const BARCODE_TOP_MARGIN: u32 = 30;
/// Columns kept on each side of the barcode.
pub const BARCODE_SIDE_MARGIN: u32 = 200;
/// Extra share of the content's top offset trimmed from the crop.
pub const HEADER_TRIM_RATIO: f64 = 0.2;

const BARCODE_RESPONSE_THRESHOLD: u8 = 100;
const BARCODE_BLUR_RADIUS: u32 = 4;
const BARCODE_CLOSE_KERNEL: KernelSize = KernelSize::new(21, 7);
const BARCODE_OPEN_KERNEL: KernelSize = KernelSize::new(9, 9);
const MIN_BARCODE_WIDTH: u32 = 40;
const MIN_BARCODE_HEIGHT: u32 = 10;
const MIN_BARCODE_TRANSITIONS: usize = 20;
const MIN_UNIFORM_COLUMN_RATIO: f64 = 0.8;

/// Crops the image to the area above a detected barcode.
///
/// Keeps rows `[0, y - 30)` and columns `[x - 200, x + w + 200)` around the
/// barcode's bounding box, clamped to the image. Detection is best-effort:
/// failures are logged and the original image is passed through as
/// [`BarcodeCrop::Uncropped`].
pub fn detect_barcode(image: &DynamicImage) -> BarcodeCrop {
    let region = match locate_barcode(image) {
        Ok(region) => region,
        Err(e) => {
            tracing::warn!(
                target: "receipt_preprocessing",
                error = %e,
                "Error while detecting barcode, continuing without barcode crop"
            );
            return BarcodeCrop::Uncropped(image.clone());
        }
    };

    let barcode = match region {
        BarcodeRegion::Found(rect) => rect,
        BarcodeRegion::NotFound => return BarcodeCrop::Uncropped(image.clone()),
    };

    match barcode_crop_window(barcode, image.width(), image.height()) {
        Some(window) => {
            tracing::debug!(
                target: "receipt_preprocessing",
                barcode = ?barcode,
                crop = ?window,
                "Cropping above detected barcode"
            );
            BarcodeCrop::Cropped {
                image: image.crop_imm(window.x, window.y, window.width, window.height),
                barcode,
            }
        }
        None => {
            tracing::warn!(
                target: "receipt_preprocessing",
                barcode = ?barcode,
                "Barcode crop window is empty, keeping uncropped image"
            );
            BarcodeCrop::Uncropped(image.clone())
        }
    }
}

/// Computes the clamped crop window for a barcode, or `None` if it is empty.
pub(crate) fn barcode_crop_window(barcode: Rect, width: u32, height: u32) -> Option<Rect> {
    let bottom = barcode.y.saturating_sub(BARCODE_TOP_MARGIN).min(height);
    let left = barcode.x.saturating_sub(BARCODE_SIDE_MARGIN).min(width);
    let right = barcode
        .x
        .saturating_add(barcode.width)
        .saturating_add(BARCODE_SIDE_MARGIN)
        .min(width);

    if bottom == 0 || right <= left {
        return None;
    }
    Some(Rect::new(left, 0, right - left, bottom))
}

/// Locates a one-dimensional barcode.
///
/// Barcodes are dense runs of vertical edges: the horizontal gradient
/// dominates the vertical one. The response is blurred, thresholded and closed
/// into blobs; the largest blob is accepted only if it has enough dark/light
/// transitions along its centre row and its columns are vertically uniform.
pub fn locate_barcode(image: &DynamicImage) -> Result<BarcodeRegion, PreprocessingError> {
    let gray = to_grayscale(image)?;
    let (width, height) = gray.dimensions();
    if width < MIN_BARCODE_WIDTH || height < MIN_BARCODE_HEIGHT {
        return Ok(BarcodeRegion::NotFound);
    }

    let gx = horizontal_sobel(&gray);
    let gy = vertical_sobel(&gray);
    let mut response = GrayImage::new(width, height);
    for (x, y, pixel) in response.enumerate_pixels_mut() {
        let dx = (gx.get_pixel(x, y)[0] as i32).abs();
        let dy = (gy.get_pixel(x, y)[0] as i32).abs();
        *pixel = Luma([(dx - dy).clamp(0, 255) as u8]);
    }

    let blurred = box_filter(&response, BARCODE_BLUR_RADIUS, BARCODE_BLUR_RADIUS);
    let mask = apply_threshold(&blurred, BARCODE_RESPONSE_THRESHOLD);
    let closed = close(&mask, BARCODE_CLOSE_KERNEL, BARCODE_CLOSE_KERNEL)?;
    let cleaned = open(&closed, BARCODE_OPEN_KERNEL, BARCODE_OPEN_KERNEL)?;

    let candidate = match largest_component(&cleaned) {
        Some(rect) => rect,
        None => return Ok(BarcodeRegion::NotFound),
    };

    let binary = apply_threshold(&gray, otsu_threshold(&gray));
    if looks_like_barcode(&binary, candidate) {
        tracing::debug!(
            target: "receipt_preprocessing",
            barcode = ?candidate,
            "Barcode located"
        );
        Ok(BarcodeRegion::Found(candidate))
    } else {
        Ok(BarcodeRegion::NotFound)
    }
}

/// Bounding box of the 8-connected foreground component with the most pixels.
fn largest_component(mask: &GrayImage) -> Option<Rect> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, count)
    let mut regions: BTreeMap<u32, (u32, u32, u32, u32, u32)> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        regions
            .entry(label)
            .and_modify(|(min_x, min_y, max_x, max_y, count)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
            })
            .or_insert((x, y, x, y, 1));
    }

    let mut best: Option<(u32, Rect)> = None;
    for (min_x, min_y, max_x, max_y, count) in regions.into_values() {
        if best.map_or(true, |(best_count, _)| count > best_count) {
            best = Some((
                count,
                Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
            ));
        }
    }
    best.map(|(_, rect)| rect)
}

fn looks_like_barcode(binary: &GrayImage, rect: Rect) -> bool {
    if rect.width < MIN_BARCODE_WIDTH || rect.height < MIN_BARCODE_HEIGHT {
        return false;
    }

    let center_y = rect.y + rect.height / 2;
    let mut transitions = 0;
    let mut previous = binary.get_pixel(rect.x, center_y)[0];
    for x in rect.x + 1..rect.x + rect.width {
        let value = binary.get_pixel(x, center_y)[0];
        if value != previous {
            transitions += 1;
            previous = value;
        }
    }
    if transitions < MIN_BARCODE_TRANSITIONS {
        return false;
    }

    let top = rect.y + rect.height / 4;
    let bottom = rect.y + (3 * rect.height) / 4;
    let uniform_columns = (rect.x..rect.x + rect.width)
        .filter(|&x| {
            let first = binary.get_pixel(x, top)[0];
            (top..bottom).all(|y| binary.get_pixel(x, y)[0] == first)
        })
        .count();

    uniform_columns as f64 / rect.width as f64 >= MIN_UNIFORM_COLUMN_RATIO
}

/// Crops the image to the bounding box of its largest external contour.
///
/// The image is grayscaled, median-blurred and Otsu-binarized; the external
/// contour with the largest enclosed area wins (first discovered on ties).
/// The returned region is rows `[floor(1.2 * y), y + h)` and columns
/// `[x, x + w)`, trimming an extra 20% of the top offset to drop header
/// whitespace. Without contours, or when the trimmed crop would be empty, the
/// original image is returned.
pub fn crop_to_content(image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
    let gray = to_grayscale(image)?;
    if gray.width() == 0 || gray.height() == 0 {
        return Ok(image.clone());
    }

    let blurred = median_blur(&gray, MEDIAN_BLUR_SIZE);
    let binary = apply_threshold(&blurred, otsu_threshold(&blurred));
    let contours: Vec<Contour<u32>> = find_contours(&binary);

    let mut largest: Option<(f64, &Contour<u32>)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let area = contour_area(contour);
        if largest.map_or(true, |(best, _)| area > best) {
            largest = Some((area, contour));
        }
    }

    let bounds = match largest.and_then(|(_, c)| Rect::bounding(c.points.iter().map(|p| (p.x, p.y)))) {
        Some(rect) => rect,
        None => {
            tracing::debug!(
                target: "receipt_preprocessing",
                "No contours found, keeping original image"
            );
            return Ok(image.clone());
        }
    };

    let top = (bounds.y as f64 + bounds.y as f64 * HEADER_TRIM_RATIO) as u32;
    let bottom = bounds.y + bounds.height;
    if top >= bottom {
        tracing::warn!(
            target: "receipt_preprocessing",
            bounds = ?bounds,
            "Content crop is empty after header trim, keeping original image"
        );
        return Ok(image.clone());
    }

    tracing::debug!(
        target: "receipt_preprocessing",
        bounds = ?bounds,
        top,
        "Cropping to dominant contour"
    );

    Ok(image.crop_imm(bounds.x, top, bounds.width, bottom - top))
}

/// Area enclosed by a contour polygon (shoelace formula).
fn contour_area(contour: &Contour<u32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (twice_area / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as DrawRect;

    fn create_blank_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
    }

    fn create_barcode_image() -> DynamicImage {
        let mut img = GrayImage::from_pixel(300, 200, Luma([255]));
        // Bars of varying width between x = 60 and x = 240, rows 120..180
        let widths = [2u32, 3, 4, 2, 3];
        let mut x = 60u32;
        let mut i = 0usize;
        while x < 240 {
            let w = widths[i % widths.len()];
            if i % 2 == 0 {
                draw_filled_rect_mut(
                    &mut img,
                    DrawRect::at(x as i32, 120).of_size(w.min(240 - x), 60),
                    Luma([0]),
                );
            }
            x += w;
            i += 1;
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_barcode_crop_window_clamps_to_image() {
        let window = barcode_crop_window(Rect::new(60, 120, 180, 60), 300, 200).unwrap();
        assert_eq!(window, Rect::new(0, 0, 300, 90));
    }

    #[test]
    fn test_barcode_crop_window_keeps_side_margins() {
        let window = barcode_crop_window(Rect::new(400, 500, 100, 40), 1000, 800).unwrap();
        assert_eq!(window, Rect::new(200, 0, 500, 470));
    }

    #[test]
    fn test_barcode_crop_window_empty_at_top() {
        assert!(barcode_crop_window(Rect::new(10, 20, 100, 40), 300, 200).is_none());
    }

    #[test]
    fn test_detect_barcode_without_barcode_returns_original() {
        let img = create_blank_image(120, 80);
        let result = detect_barcode(&img);
        assert!(result.barcode().is_none());
        assert_eq!(result.into_image(), img);
    }

    #[test]
    fn test_detect_barcode_invalid_format_is_swallowed() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(50, 50));
        let result = detect_barcode(&img);
        assert!(matches!(result, BarcodeCrop::Uncropped(_)));
    }

    #[test]
    fn test_detect_barcode_crops_above_bars() {
        let img = create_barcode_image();
        let result = detect_barcode(&img);
        let barcode = result.barcode().expect("synthetic barcode should be found");

        assert!((barcode.x as i64 - 60).abs() <= 10);
        assert!((barcode.y as i64 - 120).abs() <= 10);

        let cropped = result.image();
        assert_eq!(cropped.width(), 300);
        assert_eq!(cropped.height(), barcode.y - BARCODE_TOP_MARGIN);
    }

    #[test]
    fn test_solid_rectangle_is_not_a_barcode() {
        let mut img = GrayImage::from_pixel(300, 200, Luma([255]));
        draw_filled_rect_mut(&mut img, DrawRect::at(60, 60).of_size(180, 80), Luma([0]));
        let region = locate_barcode(&DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(region, BarcodeRegion::NotFound);
    }

    #[test]
    fn test_crop_to_content_blank_image_unchanged() {
        let img = create_blank_image(64, 48);
        let cropped = crop_to_content(&img).unwrap();
        assert_eq!(cropped, img);
    }

    #[test]
    fn test_crop_to_content_black_image_unchanged() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(32, 32));
        let cropped = crop_to_content(&img).unwrap();
        assert_eq!(cropped, img);
    }

    #[test]
    fn test_crop_to_content_trims_header_offset() {
        // Light receipt on a dark background
        let mut img = GrayImage::from_pixel(200, 300, Luma([20]));
        draw_filled_rect_mut(&mut img, DrawRect::at(40, 50).of_size(100, 200), Luma([235]));
        let cropped = crop_to_content(&DynamicImage::ImageLuma8(img)).unwrap();

        // Rows [60, 250), columns [40, 140)
        assert_eq!(cropped.width(), 100);
        assert_eq!(cropped.height(), 190);
    }

    #[test]
    fn test_crop_to_content_picks_largest_region() {
        let mut img = GrayImage::from_pixel(200, 200, Luma([10]));
        draw_filled_rect_mut(&mut img, DrawRect::at(10, 10).of_size(20, 20), Luma([240]));
        draw_filled_rect_mut(&mut img, DrawRect::at(80, 100).of_size(90, 60), Luma([240]));
        let cropped = crop_to_content(&DynamicImage::ImageLuma8(img)).unwrap();

        assert_eq!(cropped.width(), 90);
        assert_eq!(cropped.height(), 40);
    }

    #[test]
    fn test_contour_area_of_square() {
        use imageproc::point::Point;
        let contour = Contour {
            points: vec![
                Point::new(0u32, 0u32),
                Point::new(4, 0),
                Point::new(4, 4),
                Point::new(0, 4),
            ],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(contour_area(&contour), 16.0);
    }
}
