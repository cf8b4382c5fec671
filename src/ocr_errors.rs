//! # OCR Error Types Module
//!
//! This module defines the error type returned by text recognition.

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// Requested language has no installed trained data
    UnsupportedLanguage(String),
    /// OCR engine initialization errors
    Initialization(String),
    /// Image could not be handed to the engine
    ImageLoad(String),
    /// Text extraction errors
    Extraction(String),
    /// Writing the recognized text failed
    Output(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::UnsupportedLanguage(lang) => {
                write!(f, "[OCR_LANGUAGE] Unsupported language for OCR: {}", lang)
            }
            OcrError::Initialization(msg) => {
                write!(f, "[OCR_INIT] OCR engine initialization failed: {}", msg)
            }
            OcrError::ImageLoad(msg) => {
                write!(f, "[IMAGE_LOAD] Failed to load image for OCR processing: {}", msg)
            }
            OcrError::Extraction(msg) => {
                write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg)
            }
            OcrError::Output(msg) => write!(f, "[OCR_OUTPUT] Failed to save recognized text: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}
