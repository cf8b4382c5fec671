//! # Test Helper Library
//!
//! Synthetic receipt fixtures shared by the integration tests, drawn with
//! `imageproc` so no binary assets are needed.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use receipt_reader::preprocessing::{estimate_skew, SkewConfig};

/// White page with a solid dark rectangle rotated about the page center.
///
/// Positive angles tilt the rectangle clockwise as displayed, which is the
/// skew the pipeline corrects with a counter-clockwise rotation.
pub fn create_rotated_block(
    width: u32,
    height: u32,
    block_width: f64,
    block_height: f64,
    angle_degrees: f64,
) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([255]));
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (hw, hh) = (block_width / 2.0, block_height / 2.0);

    let corner = |dx: f64, dy: f64| {
        Point::new(
            (cx + dx * cos - dy * sin).round() as i32,
            (cy + dx * sin + dy * cos).round() as i32,
        )
    };
    let polygon = [
        corner(-hw, -hh),
        corner(hw, -hh),
        corner(hw, hh),
        corner(-hw, hh),
    ];
    draw_polygon_mut(&mut img, &polygon, Luma([0]));
    img
}

/// Receipt-like page: two text lines near the top and a barcode below them.
///
/// The barcode occupies columns 60..240 and rows `barcode_top..barcode_top + 60`.
pub fn create_receipt_with_barcode(barcode_top: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(300, barcode_top + 100, Luma([255]));
    draw_filled_rect_mut(&mut img, Rect::at(40, 30).of_size(200, 14), Luma([0]));
    draw_filled_rect_mut(&mut img, Rect::at(40, 70).of_size(150, 14), Luma([0]));

    let widths = [2u32, 3, 4, 2, 3];
    let mut x = 60u32;
    let mut i = 0usize;
    while x < 240 {
        let w = widths[i % widths.len()];
        if i % 2 == 0 {
            draw_filled_rect_mut(
                &mut img,
                Rect::at(x as i32, barcode_top as i32).of_size(w.min(240 - x), 60),
                Luma([0]),
            );
        }
        x += w;
        i += 1;
    }
    img
}

/// Skew remaining in the central region of an image, in degrees.
///
/// Only the strongest Hough peak is considered, so short edge fragments left
/// by interpolation cannot outvote the dominant line.
pub fn residual_skew_degrees(image: &DynamicImage) -> Option<f64> {
    let (w, h) = (image.width(), image.height());
    let center = image.crop_imm(w / 4, h / 4, w / 2, h / 2);
    let config = SkewConfig {
        num_peaks: 1,
        ..Default::default()
    };
    estimate_skew(&center, &config)
        .ok()
        .flatten()
        .map(|estimate| estimate.angle_degrees)
}

/// Share of samples that are neither 0 nor 255.
pub fn non_binary_fraction(image: &DynamicImage) -> f64 {
    let gray = image.to_luma8();
    let total = (gray.width() * gray.height()).max(1) as f64;
    let non_binary = gray.pixels().filter(|p| p[0] != 0 && p[0] != 255).count();
    non_binary as f64 / total
}
