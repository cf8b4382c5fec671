//! # Image Deskewing Module
//!
//! Detects the dominant line angle of a page with a Hough transform and
//! rotates the page so text lines become horizontal.
//!
//! Detection runs in stages: Canny edges, Hough accumulation over a fixed
//! angle grid, peak extraction, angle normalization, optional bounds
//! filtering, and selection of the most frequent angle.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use tracing;

use super::color::to_grayscale;
use super::filtering::{convolve_separable, gaussian_kernel_for_sigma, to_plane, BorderMode};
use super::types::{AnglePeak, PreprocessingError, SkewConfig, SkewEstimate};

/// Peaks must exceed this share of the strongest accumulator cell.
pub const PEAK_THRESHOLD_RATIO: f64 = 0.05;
/// Half-size of the peak neighborhood along the distance axis, in bins.
pub const PEAK_MIN_DISTANCE: usize = 9;
/// Half-size of the peak neighborhood along the angle axis, in bins.
pub const PEAK_MIN_ANGLE: usize = 10;

// Hysteresis thresholds on gradient magnitude, as a share of full scale.
const CANNY_LOW_THRESHOLD: f64 = 0.1;
const CANNY_HIGH_THRESHOLD: f64 = 0.2;
const MAX_ANGLE_BINS: usize = 1_000_000;

/// Detects skew and rotates the image to correct it.
///
/// Returns an unmodified copy of the input when no Hough peak qualifies or
/// when the angle bounds reject every candidate. Failures during edge or
/// Hough processing are returned as [`PreprocessingError::SkewDetection`].
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, GrayImage, Luma};
/// use receipt_reader::preprocessing::{correct_skew, SkewConfig};
///
/// let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
/// let corrected = correct_skew(&blank, &SkewConfig::default()).unwrap();
/// assert_eq!(corrected, blank);
/// ```
pub fn correct_skew(
    image: &DynamicImage,
    config: &SkewConfig,
) -> Result<DynamicImage, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let estimate = match estimate_skew(image, config)? {
        Some(estimate) => estimate,
        None => {
            tracing::debug!(
                target: "receipt_preprocessing",
                "No qualifying lines found, skipping deskewing"
            );
            return Ok(image.clone());
        }
    };

    let rotated = rotate_image(image, estimate.angle_degrees)?;

    tracing::debug!(
        target: "receipt_preprocessing",
        angle_degrees = estimate.angle_degrees,
        peaks = estimate.peaks.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Deskewing completed"
    );

    Ok(rotated)
}

/// Runs skew detection without rotating.
///
/// Returns `Ok(None)` for the no-skew cases: an empty image, no qualifying
/// Hough peaks, or every normalized angle rejected by the configured bounds.
pub fn estimate_skew(
    image: &DynamicImage,
    config: &SkewConfig,
) -> Result<Option<SkewEstimate>, PreprocessingError> {
    config.validate()?;
    let gray = to_grayscale(image)?;
    if gray.width() == 0 || gray.height() == 0 {
        return Ok(None);
    }

    let num_angles = angle_bin_count(config.min_deviation)?;
    let edges = canny_edges(&gray, config.sigma);
    let accumulator = HoughAccumulator::accumulate(&edges, gray.width(), gray.height(), num_angles);
    let peaks = accumulator.peaks(config.num_peaks);

    if peaks.is_empty() {
        return Ok(None);
    }

    let candidates: Vec<f64> = peaks
        .iter()
        .map(|peak| normalize_angle(peak.angle, config.normalize_to_90))
        .filter(|angle| config.min_angle.map_or(true, |min| *angle >= min))
        .filter(|angle| config.max_angle.map_or(true, |max| *angle <= max))
        .collect();

    let angle = match dominant_angle(&candidates) {
        Some(angle) => angle,
        None => {
            tracing::debug!(
                target: "receipt_preprocessing",
                peaks = peaks.len(),
                "All peak angles rejected by bounds"
            );
            return Ok(None);
        }
    };

    Ok(Some(SkewEstimate {
        angle_radians: angle,
        angle_degrees: angle * 180.0 / PI,
        peaks,
    }))
}

/// Number of discrete angles spanning `[-π/2, π/2)` for a given resolution.
pub fn angle_bin_count(min_deviation: f64) -> Result<usize, PreprocessingError> {
    let bins = (PI / min_deviation).round();
    if !bins.is_finite() || bins < 1.0 || bins > MAX_ANGLE_BINS as f64 {
        return Err(PreprocessingError::SkewDetection {
            message: format!(
                "min_deviation {} yields an unusable angle grid of {} bins",
                min_deviation, bins
            ),
        });
    }
    Ok(bins as usize)
}

/// Folds a Hough normal angle into the correction range.
///
/// With `normalize_to_90` the result lies in `[-π/2, π/2)`; otherwise the angle
/// is folded into `[-π/4, π/4)`, treating text lines as roughly horizontal or
/// vertical.
pub fn normalize_angle(angle: f64, normalize_to_90: bool) -> f64 {
    if normalize_to_90 {
        angle.rem_euclid(PI) - FRAC_PI_2
    } else {
        (angle + FRAC_PI_4).rem_euclid(FRAC_PI_2) - FRAC_PI_4
    }
}

/// Picks the most frequent angle by exact value; the first seen wins ties.
///
/// This is a single-value selection, not a median of the candidates.
pub fn dominant_angle(angles: &[f64]) -> Option<f64> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &angle in angles {
        match counts.iter_mut().find(|(value, _)| *value == angle) {
            Some((_, count)) => *count += 1,
            None => counts.push((angle, 1)),
        }
    }

    let max_count = counts.iter().map(|(_, count)| *count).max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == max_count)
        .map(|(angle, _)| angle)
}

/// Rotates about the integer image center, positive angles counter-clockwise.
///
/// Uses bicubic interpolation with black fill; the output keeps the input size.
pub fn rotate_image(
    image: &DynamicImage,
    angle_degrees: f64,
) -> Result<DynamicImage, PreprocessingError> {
    match image {
        DynamicImage::ImageLuma8(gray) => Ok(DynamicImage::ImageLuma8(rotate_buffer(
            gray,
            angle_degrees,
            Luma([0]),
        ))),
        DynamicImage::ImageRgb8(rgb) => Ok(DynamicImage::ImageRgb8(rotate_buffer(
            rgb,
            angle_degrees,
            Rgb([0, 0, 0]),
        ))),
        other => Err(PreprocessingError::SkewDetection {
            message: format!("unsupported image format for rotation: {:?}", other.color()),
        }),
    }
}

fn rotate_buffer<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    angle_degrees: f64,
    fill: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    if angle_degrees == 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let cx = (image.width() / 2) as f32;
    let cy = (image.height() / 2) as f32;
    // Image rows grow downwards, so a counter-clockwise turn is a negative rotation
    let theta = -(angle_degrees.to_radians() as f32);
    let projection = Projection::translate(cx, cy)
        * Projection::rotate(theta)
        * Projection::translate(-cx, -cy);

    warp(image, &projection, Interpolation::Bicubic, fill)
}

/// Canny edge detection with Gaussian pre-smoothing of standard deviation `sigma`.
///
/// Returns a row-major edge mask. Pixels on the image border are never edges.
pub fn canny_edges(gray: &GrayImage, sigma: f64) -> Vec<bool> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let mut edges = vec![false; w * h];
    if w < 3 || h < 3 {
        return edges;
    }

    let normalized: Vec<f64> = to_plane(gray).into_iter().map(|v| v / 255.0).collect();
    let kernel = gaussian_kernel_for_sigma(sigma);
    let smoothed = convolve_separable(&normalized, w, h, &kernel, &kernel, BorderMode::Replicate);

    let at = |x: usize, y: usize| smoothed[y * w + x];
    let mut gx = vec![0.0; w * h];
    let mut gy = vec![0.0; w * h];
    let mut magnitude = vec![0.0; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let dx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let dy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y * w + x;
            gx[i] = dx;
            gy[i] = dy;
            magnitude[i] = dx.hypot(dy);
        }
    }

    // Non-maximum suppression along the quantized gradient direction
    let tan_22_5 = (PI / 8.0).tan();
    let tan_67_5 = (3.0 * PI / 8.0).tan();
    let mut candidate = vec![false; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = magnitude[i];
            if m < CANNY_LOW_THRESHOLD {
                continue;
            }
            let (ax, ay) = (gx[i].abs(), gy[i].abs());
            let (a, b) = if ay <= ax * tan_22_5 {
                (i - 1, i + 1)
            } else if ay >= ax * tan_67_5 {
                (i - w, i + w)
            } else if gx[i] * gy[i] > 0.0 {
                (i - w - 1, i + w + 1)
            } else {
                (i - w + 1, i + w - 1)
            };
            candidate[i] = m >= magnitude[a] && m >= magnitude[b];
        }
    }

    // Hysteresis: keep weak candidates connected to a strong one
    let mut queue = VecDeque::new();
    for i in 0..w * h {
        if candidate[i] && magnitude[i] >= CANNY_HIGH_THRESHOLD {
            edges[i] = true;
            queue.push_back(i);
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let j = ny * w + nx;
                if candidate[j] && !edges[j] {
                    edges[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }

    edges
}

/// Straight-line Hough accumulator.
///
/// Rows index the signed distance `round(x cos θ + y sin θ) + offset`, columns
/// index the angle grid `θ_k = -π/2 + k π / n`.
#[derive(Debug, Clone)]
pub struct HoughAccumulator {
    votes: Vec<u32>,
    angles: Vec<f64>,
    rows: usize,
    offset: usize,
}

impl HoughAccumulator {
    /// Accumulates votes from a row-major edge mask.
    pub fn accumulate(edges: &[bool], width: u32, height: u32, num_angles: usize) -> Self {
        let angles: Vec<f64> = (0..num_angles)
            .map(|k| -FRAC_PI_2 + k as f64 * PI / num_angles as f64)
            .collect();
        let offset = (width as f64).hypot(height as f64).ceil() as usize;
        let rows = 2 * offset + 1;
        let mut votes = vec![0u32; rows * num_angles];

        let trig: Vec<(f64, f64)> = angles.iter().map(|a| (a.cos(), a.sin())).collect();
        let w = width as usize;
        for (i, _) in edges.iter().enumerate().filter(|(_, &edge)| edge) {
            let (x, y) = ((i % w) as f64, (i / w) as f64);
            for (k, (cos, sin)) in trig.iter().enumerate() {
                let distance = (x * cos + y * sin).round() as i64 + offset as i64;
                votes[distance as usize * num_angles + k] += 1;
            }
        }

        Self {
            votes,
            angles,
            rows,
            offset,
        }
    }

    pub fn max_votes(&self) -> u32 {
        self.votes.iter().copied().max().unwrap_or(0)
    }

    /// Extracts up to `num_peaks` prominent peaks, strongest first.
    ///
    /// A cell qualifies when it equals the maximum of its neighborhood and its
    /// votes exceed [`PEAK_THRESHOLD_RATIO`] of the global maximum. Accepted
    /// peaks suppress their neighborhood; the angle axis wraps around, which
    /// mirrors the distance axis.
    pub fn peaks(&self, num_peaks: usize) -> Vec<AnglePeak> {
        let cols = self.angles.len();
        let max_votes = self.max_votes();
        if max_votes == 0 || cols == 0 {
            return Vec::new();
        }
        let threshold = PEAK_THRESHOLD_RATIO * max_votes as f64;
        let half_angle = PEAK_MIN_ANGLE.min(cols);
        let local_max = self.neighborhood_max(PEAK_MIN_DISTANCE, half_angle);

        let mut candidates: Vec<usize> = (0..self.votes.len())
            .filter(|&i| self.votes[i] == local_max[i] && self.votes[i] as f64 > threshold)
            .collect();
        // Stable: equal votes keep scan order
        candidates.sort_by(|a, b| self.votes[*b].cmp(&self.votes[*a]));

        let mut suppressed = vec![false; self.votes.len()];
        let mut peaks = Vec::new();
        for index in candidates {
            if peaks.len() == num_peaks {
                break;
            }
            if suppressed[index] {
                continue;
            }
            let (row, col) = (index / cols, index % cols);
            peaks.push(AnglePeak {
                angle: self.angles[col],
                distance: row as f64 - self.offset as f64,
                votes: self.votes[index],
            });
            self.suppress(&mut suppressed, row, col, half_angle);
        }

        peaks
    }

    /// Separable maximum filter; cells outside the accumulator count as zero.
    fn neighborhood_max(&self, half_rows: usize, half_cols: usize) -> Vec<u32> {
        let cols = self.angles.len();
        let mut horizontal = vec![0u32; self.votes.len()];
        for r in 0..self.rows {
            for c in 0..cols {
                let lo = c.saturating_sub(half_cols);
                let hi = (c + half_cols).min(cols - 1);
                horizontal[r * cols + c] = (lo..=hi)
                    .map(|cc| self.votes[r * cols + cc])
                    .max()
                    .unwrap_or(0);
            }
        }

        let mut result = vec![0u32; self.votes.len()];
        for r in 0..self.rows {
            let lo = r.saturating_sub(half_rows);
            let hi = (r + half_rows).min(self.rows - 1);
            for c in 0..cols {
                result[r * cols + c] = (lo..=hi)
                    .map(|rr| horizontal[rr * cols + c])
                    .max()
                    .unwrap_or(0);
            }
        }
        result
    }

    fn suppress(&self, suppressed: &mut [bool], row: usize, col: usize, half_cols: usize) {
        let cols = self.angles.len() as i64;
        let rows = self.rows as i64;
        let (half_rows, half_cols) = (PEAK_MIN_DISTANCE as i64, half_cols as i64);

        for dr in -half_rows..=half_rows {
            for dc in -half_cols..=half_cols {
                let mut r = row as i64 + dr;
                let mut c = col as i64 + dc;
                if r < 0 || r >= rows {
                    continue;
                }
                // Crossing ±π/2 flips the sign of the distance
                if c < 0 {
                    c += cols;
                    r = rows - 1 - r;
                } else if c >= cols {
                    c -= cols;
                    r = rows - 1 - r;
                }
                if (0..cols).contains(&c) && (0..rows).contains(&r) {
                    suppressed[(r * cols + c) as usize] = true;
                }
            }
        }
    }
}
