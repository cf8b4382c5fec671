//! # Run-Length JSON Serialization
//!
//! Binary images travel as JSON objects `{"image", "height", "width"}` where
//! `image` is a run-length encoding of the hex dump of the pixel buffer.
//!
//! Each run of identical hex digits becomes `|<count/2><digit>`. A binary
//! pixel is two identical digits (`00` or `ff`), so the halved count is the
//! number of pixels in the run.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

pub const COMPRESSION_DELIMITER: char = '|';

/// Errors raised while encoding or decoding serialized images.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializationError {
    /// Image has a zero dimension
    EmptyImage,
    /// Input text or file name is empty
    EmptyInput(&'static str),
    /// JSON could not be parsed or lacks a required field
    InvalidJson(String),
    /// A run does not have the `<count><digit>` shape
    InvalidRun(String),
    /// Only `0` and `f` digits describe binary pixels
    UnsupportedDigit(char),
    /// Pixel value other than 0 or 255
    NonBinarySample(u8),
    /// Decoded sample count disagrees with the declared dimensions
    SampleCountMismatch { expected: usize, actual: usize },
    /// Writing the output file failed
    Io(String),
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::EmptyImage => write!(f, "Invalid image dimensions"),
            SerializationError::EmptyInput(what) => write!(f, "{} is empty", what),
            SerializationError::InvalidJson(msg) => {
                write!(f, "Invalid JSON format for image data: {}", msg)
            }
            SerializationError::InvalidRun(run) => write!(f, "Malformed run '{}'", run),
            SerializationError::UnsupportedDigit(digit) => {
                write!(f, "Unsupported digit '{}' in encoded image", digit)
            }
            SerializationError::NonBinarySample(value) => {
                write!(f, "Sample {} is not binary (0 or 255)", value)
            }
            SerializationError::SampleCountMismatch { expected, actual } => write!(
                f,
                "Encoded image has {} samples, expected {}",
                actual, expected
            ),
            SerializationError::Io(msg) => write!(f, "Failed to write JSON file: {}", msg),
        }
    }
}

impl std::error::Error for SerializationError {}

/// JSON document layout for a serialized image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub image: String,
    pub height: u32,
    pub width: u32,
}

/// Run-length encode a string of hex digits.
///
/// # Examples
///
/// ```
/// use receipt_reader::serialization::compress_hex;
///
/// assert_eq!(compress_hex("0000ffff00"), "|20|2f|10");
/// assert_eq!(compress_hex(""), "");
/// ```
pub fn compress_hex(hex: &str) -> String {
    let mut compressed = String::new();
    let mut chars = hex.chars();
    let Some(mut current) = chars.next() else {
        return compressed;
    };
    let mut count = 1usize;

    for c in chars {
        if c == current {
            count += 1;
        } else {
            push_run(&mut compressed, count, current);
            current = c;
            count = 1;
        }
    }
    push_run(&mut compressed, count, current);

    compressed
}

fn push_run(out: &mut String, count: usize, digit: char) {
    let _ = write!(out, "{}{}{}", COMPRESSION_DELIMITER, count / 2, digit);
}

/// Decode a run-length string into pixel samples.
///
/// Every run's digit is repeated `count` times and each digit becomes one
/// sample: `f` maps to 255 and `0` to 0. Text before the first delimiter is
/// ignored.
pub fn decompress_hex(encoded: &str) -> Result<Vec<u8>, SerializationError> {
    decompress_hex_bounded(encoded, usize::MAX)
}

/// Same as [`decompress_hex`], failing as soon as the runs describe more than
/// `max_samples` samples.
pub fn decompress_hex_bounded(
    encoded: &str,
    max_samples: usize,
) -> Result<Vec<u8>, SerializationError> {
    let mut samples = Vec::new();
    let mut total = 0usize;

    for run in encoded.split(COMPRESSION_DELIMITER).skip(1) {
        let mut chars = run.chars();
        let digit = chars
            .next_back()
            .ok_or_else(|| SerializationError::InvalidRun(run.to_string()))?;
        let count: usize = chars
            .as_str()
            .parse()
            .map_err(|_| SerializationError::InvalidRun(run.to_string()))?;

        let value = match digit {
            'f' => 255,
            '0' => 0,
            other => return Err(SerializationError::UnsupportedDigit(other)),
        };

        total = total.saturating_add(count);
        if total > max_samples {
            return Err(SerializationError::SampleCountMismatch {
                expected: max_samples,
                actual: total,
            });
        }
        samples.extend(std::iter::repeat(value).take(count));
    }

    Ok(samples)
}

/// Serialize a binary grayscale image to its JSON form.
pub fn image_to_json(image: &GrayImage) -> Result<String, SerializationError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SerializationError::EmptyImage);
    }

    let mut hex = String::with_capacity(image.as_raw().len() * 2);
    for &sample in image.as_raw() {
        if sample != 0 && sample != 255 {
            return Err(SerializationError::NonBinarySample(sample));
        }
        let _ = write!(hex, "{:02x}", sample);
    }

    let document = EncodedImage {
        image: compress_hex(&hex),
        height,
        width,
    };
    serde_json::to_string(&document).map_err(|e| SerializationError::InvalidJson(e.to_string()))
}

/// Rebuild a grayscale image from its JSON form.
pub fn json_to_image(json: &str) -> Result<GrayImage, SerializationError> {
    if json.trim().is_empty() {
        return Err(SerializationError::EmptyInput("JSON string"));
    }

    let document: EncodedImage =
        serde_json::from_str(json).map_err(|e| SerializationError::InvalidJson(e.to_string()))?;
    let expected = document.width as usize * document.height as usize;
    let samples = decompress_hex_bounded(&document.image, expected)?;

    if samples.len() != expected {
        return Err(SerializationError::SampleCountMismatch {
            expected,
            actual: samples.len(),
        });
    }

    GrayImage::from_raw(document.width, document.height, samples).ok_or(
        SerializationError::SampleCountMismatch {
            expected,
            actual: 0,
        },
    )
}

/// Write the JSON form of an image to `<file_name>.json`.
pub fn save_to_json(file_name: &str, image: &GrayImage) -> Result<PathBuf, SerializationError> {
    if file_name.is_empty() {
        return Err(SerializationError::EmptyInput("File name"));
    }

    let json = image_to_json(image)?;
    let path = PathBuf::from(format!("{}.json", file_name));
    write_json(&path, &json)?;

    info!(path = %path.display(), "Created JSON file");
    Ok(path)
}

fn write_json(path: &Path, json: &str) -> Result<(), SerializationError> {
    std::fs::write(path, json).map_err(|e| SerializationError::Io(format!("{}: {}", path.display(), e)))
}
