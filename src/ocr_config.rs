//! # OCR Configuration Module
//!
//! This module defines configuration structures for text recognition:
//! language selection, the set of installed language packs, and Tesseract
//! engine parameters.

use crate::errors::{AppError, AppResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGE: &str = "pol";
pub const DEFAULT_INSTALLED_LANGUAGES: &[&str] = &["pol", "eng"];

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    #[default]
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    SingleBlock = 6,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
        }
    }

    /// Parse the numeric Tesseract value
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "3" => Some(PageSegMode::Auto),
            "4" => Some(PageSegMode::SingleColumn),
            "6" => Some(PageSegMode::SingleBlock),
            "11" => Some(PageSegMode::SparseText),
            _ => None,
        }
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// Default recognition language code (e.g., "pol", "eng")
    pub language: String,
    /// Language codes with trained data available to the engine
    pub installed_languages: Vec<String>,
    /// Directory holding the `.traineddata` files; engine default when unset
    pub tessdata_path: Option<String>,
    /// Page segmentation mode passed to Tesseract
    pub psm_mode: PageSegMode,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            installed_languages: DEFAULT_INSTALLED_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            tessdata_path: None,
            psm_mode: PageSegMode::default(),
        }
    }
}

impl OcrConfig {
    /// Check whether a language pack is available.
    ///
    /// Combined codes such as `pol+eng` are supported when every part is.
    pub fn supports_language(&self, language: &str) -> bool {
        !language.trim().is_empty()
            && language
                .split('+')
                .all(|part| self.installed_languages.iter().any(|l| l == part))
    }

    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.installed_languages.is_empty() {
            return Err(AppError::Config(
                "At least one installed OCR language is required".to_string(),
            ));
        }
        if !self.supports_language(&self.language) {
            return Err(AppError::Config(format!(
                "Default OCR language '{}' is not among installed languages [{}]",
                self.language,
                self.installed_languages.join(", ")
            )));
        }
        if let Some(path) = &self.tessdata_path {
            if path.trim().is_empty() {
                return Err(AppError::Config("TESSDATA_PATH cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "pol");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_supports_combined_languages() {
        let config = OcrConfig::default();
        assert!(config.supports_language("pol+eng"));
        assert!(!config.supports_language("pol+deu"));
        assert!(!config.supports_language(""));
    }

    #[test]
    fn test_unsupported_default_language_rejected() {
        let config = OcrConfig {
            language: "deu".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_psm_codes() {
        assert_eq!(PageSegMode::default().as_str(), "3");
        assert_eq!(PageSegMode::from_code("6"), Some(PageSegMode::SingleBlock));
        assert_eq!(PageSegMode::from_code("42"), None);
    }
}
