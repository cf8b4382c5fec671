//! # OCR Processing Module
//!
//! Text recognition over preprocessed receipt images.
//!
//! Recognition sits behind the [`TextRecognizer`] trait so the rest of the
//! crate never depends on a particular engine. [`TesseractRecognizer`] is the
//! production implementation built on `leptess`.

use image::{DynamicImage, GrayImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::observability;
pub use crate::ocr_config::{OcrConfig, PageSegMode};
pub use crate::ocr_errors::OcrError;

/// Engine-agnostic text recognition.
pub trait TextRecognizer {
    /// Recognize the text in a grayscale image using the given language code.
    fn recognize_text(&self, image: &GrayImage, language: &str) -> Result<String, OcrError>;
}

/// Tesseract-backed recognizer.
///
/// A fresh engine is created per call, so the recognizer itself is immutable
/// and can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    config: OcrConfig,
}

impl TesseractRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize_text(&self, image: &GrayImage, language: &str) -> Result<String, OcrError> {
        if !self.config.supports_language(language) {
            return Err(OcrError::UnsupportedLanguage(language.to_string()));
        }

        let start_time = std::time::Instant::now();
        let png = encode_png(image)?;

        let mut tess = leptess::LepTess::new(self.config.tessdata_path.as_deref(), language)
            .map_err(|e| OcrError::Initialization(e.to_string()))?;
        tess.set_variable(
            leptess::Variable::TesseditPagesegMode,
            self.config.psm_mode.as_str(),
        )
        .map_err(|e| OcrError::Initialization(format!("Failed to set PSM mode: {}", e)))?;

        tess.set_image_from_mem(&png)
            .map_err(|e| OcrError::ImageLoad(e.to_string()))?;

        let result = tess
            .get_utf8_text()
            .map_err(|e| OcrError::Extraction(e.to_string()));

        let duration = start_time.elapsed();
        observability::record_ocr_metrics(result.is_ok(), duration);

        let text = result?;
        debug!(
            language = %language,
            chars = text.chars().count(),
            duration_ms = duration.as_millis() as u64,
            "Text recognized"
        );
        Ok(text)
    }
}

fn encode_png(image: &GrayImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| OcrError::ImageLoad(format!("Failed to encode image: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Recognize text and write it to `<save_dir>/<file_name>.txt`.
///
/// The directory must already exist; returns the path of the written file.
pub fn image_to_text_file<R: TextRecognizer + ?Sized>(
    recognizer: &R,
    image: &GrayImage,
    language: &str,
    save_dir: impl AsRef<Path>,
    file_name: &str,
) -> Result<PathBuf, OcrError> {
    let save_dir = save_dir.as_ref();
    if !save_dir.is_dir() {
        return Err(OcrError::Output(format!(
            "Save directory does not exist: {}",
            save_dir.display()
        )));
    }

    let text = recognizer.recognize_text(image, language)?;
    let path = save_dir.join(format!("{}.txt", file_name));
    std::fs::write(&path, text)
        .map_err(|e| OcrError::Output(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), "Recognized text saved");
    Ok(path)
}
