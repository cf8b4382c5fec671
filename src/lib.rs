//! # Receipt Reader
//!
//! Turns photographed shop receipts into clean, deskewed binary images ready
//! for text recognition, with file I/O, run-length JSON serialization and a
//! Tesseract adapter around the preprocessing core.

pub mod config;
pub mod errors;
pub mod image_io;
pub mod observability;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod preprocessing;
pub mod serialization;

// Re-export types for easier access
pub use preprocessing::{preprocess, PreprocessingError, Preprocessor, SkewConfig};
