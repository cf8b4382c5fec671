//! # Image File I/O
//!
//! Loading and saving receipt images. Decoded images are normalized to the two
//! layouts the preprocessing pipeline accepts: 8-bit grayscale and 8-bit RGB.

use image::DynamicImage;
use std::path::Path;
use tracing::{debug, info};

/// File extensions accepted by [`load_image`], compared case-insensitively.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".bmp", ".gif"];

/// Errors raised while reading or writing image files.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageIoError {
    /// The input path does not exist
    NotFound(String),
    /// The file extension is not a supported image type
    UnsupportedFormat(String),
    /// The file exists but could not be decoded
    DecodeFailure(String),
    /// The image could not be written
    EncodeFailure(String),
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageIoError::NotFound(path) => write!(f, "Image file does not exist: {}", path),
            ImageIoError::UnsupportedFormat(path) => {
                write!(f, "Unsupported image format: {}", path)
            }
            ImageIoError::DecodeFailure(msg) => write!(f, "Failed to load the image: {}", msg),
            ImageIoError::EncodeFailure(msg) => write!(f, "Failed to save the image: {}", msg),
        }
    }
}

impl std::error::Error for ImageIoError {}

/// Check whether a path carries one of the supported image extensions.
///
/// # Examples
///
/// ```
/// use receipt_reader::image_io::is_supported_image_path;
///
/// assert!(is_supported_image_path("receipt.JPG"));
/// assert!(!is_supported_image_path("receipt.tiff"));
/// ```
pub fn is_supported_image_path(path: impl AsRef<Path>) -> bool {
    let lower = path.as_ref().to_string_lossy().to_lowercase();
    SUPPORTED_IMAGE_EXTENSIONS
        .iter()
        .any(|extension| lower.ends_with(extension))
}

/// Load an image from disk.
///
/// Checks run in order: existence, extension, decoding. Any layout other than
/// 8-bit grayscale is converted to 8-bit RGB.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, ImageIoError> {
    let path = path.as_ref();
    let path_display = path.display().to_string();

    if !path.exists() {
        return Err(ImageIoError::NotFound(path_display));
    }
    if !is_supported_image_path(path) {
        return Err(ImageIoError::UnsupportedFormat(path_display));
    }

    let decoded = image::open(path)
        .map_err(|e| ImageIoError::DecodeFailure(format!("{}: {}", path_display, e)))?;

    let normalized = match decoded {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => decoded,
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            DynamicImage::ImageLuma8(decoded.to_luma8())
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    debug!(
        path = %path_display,
        width = normalized.width(),
        height = normalized.height(),
        color = ?normalized.color(),
        "Image loaded"
    );

    Ok(normalized)
}

/// Save an image to disk; the format follows the file extension.
pub fn save_image(path: impl AsRef<Path>, image: &DynamicImage) -> Result<(), ImageIoError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ImageIoError::EncodeFailure("File path is empty".to_string()));
    }

    image
        .save(path)
        .map_err(|e| ImageIoError::EncodeFailure(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), "Image saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_image_path("a.png"));
        assert!(is_supported_image_path("a.JPEG"));
        assert!(is_supported_image_path("dir/a.Gif"));
        assert!(!is_supported_image_path("a.webp"));
        assert!(!is_supported_image_path("png"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = load_image("/definitely/not/here.png");
        assert!(matches!(result, Err(ImageIoError::NotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(matches!(load_image(&path), Err(ImageIoError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_corrupt_file_fails_to_decode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not really a png").unwrap();
        assert!(matches!(load_image(&path), Err(ImageIoError::DecodeFailure(_))));
    }

    #[test]
    fn test_gray_png_roundtrip_keeps_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.png");
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(7, 5, Luma([200])));
        save_image(&path, &img).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_alpha_png_normalized_to_rgb() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 255])));
        save_image(&path, &img).unwrap();

        let loaded = load_image(&path).unwrap();
        assert!(matches!(loaded, DynamicImage::ImageRgb8(_)));
        assert_eq!(loaded.to_rgb8().get_pixel(1, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_save_empty_path_fails() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        assert!(matches!(save_image("", &img), Err(ImageIoError::EncodeFailure(_))));
    }
}
