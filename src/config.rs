//! # Unified Application Configuration
//!
//! This module consolidates preprocessing, OCR and logging settings into a
//! single configuration object loaded from environment variables.

use crate::errors::{AppError, AppResult};
use crate::ocr_config::{OcrConfig, PageSegMode};
use crate::preprocessing::SkewConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Preprocessing pipeline settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Hough skew detection parameters
    pub skew: SkewConfig,
}

impl PreprocessingConfig {
    /// Validate preprocessing configuration
    pub fn validate(&self) -> AppResult<()> {
        self.skew
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))
    }
}

/// Output format for log records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                other
            ))),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level for this crate's targets
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// Validate logging configuration
    pub fn validate(&self) -> AppResult<()> {
        if !Self::LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "LOG_LEVEL must be one of {}, got '{}'",
                Self::LEVELS.join(", "),
                self.level
            )));
        }
        Ok(())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Preprocessing configuration
    pub preprocessing: PreprocessingConfig,
    /// OCR processing configuration
    pub ocr: OcrConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Skew detection
        let skew = &mut config.preprocessing.skew;
        if let Some(sigma) = parse_var(&lookup, "SKEW_SIGMA")? {
            skew.sigma = sigma;
        }
        if let Some(num_peaks) = parse_var(&lookup, "SKEW_NUM_PEAKS")? {
            skew.num_peaks = num_peaks;
        }
        if let Some(min_deviation) = parse_var(&lookup, "SKEW_MIN_DEVIATION")? {
            skew.min_deviation = min_deviation;
        }
        skew.min_angle = parse_var(&lookup, "SKEW_MIN_ANGLE")?;
        skew.max_angle = parse_var(&lookup, "SKEW_MAX_ANGLE")?;
        if let Some(normalize) = lookup("SKEW_NORMALIZE_TO_90") {
            skew.normalize_to_90 = normalize.trim().to_lowercase() == "true";
        }

        // OCR
        if let Some(language) = lookup("OCR_LANGUAGE") {
            config.ocr.language = language.trim().to_string();
        }
        if let Some(languages) = lookup("OCR_INSTALLED_LANGUAGES") {
            config.ocr.installed_languages = languages
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
        config.ocr.tessdata_path = lookup("TESSDATA_PATH");
        if let Some(psm) = lookup("OCR_PSM_MODE") {
            config.ocr.psm_mode = PageSegMode::from_code(&psm).ok_or_else(|| {
                AppError::Config(format!("OCR_PSM_MODE '{}' is not supported", psm))
            })?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = level.trim().to_lowercase();
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.logging.format = format.parse()?;
        }

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.preprocessing.validate()?;
        self.ocr.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: skew_sigma={}, skew_num_peaks={}, ocr_language={}, installed_languages={}, log_level={}",
            self.preprocessing.skew.sigma,
            self.preprocessing.skew.num_peaks,
            self.ocr.language,
            self.ocr.installed_languages.join("+"),
            self.logging.level
        )
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} must be a valid number, got '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_skew_settings_loaded() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SKEW_SIGMA", "2.5"),
            ("SKEW_NUM_PEAKS", "8"),
            ("SKEW_MIN_DEVIATION", "0.005"),
            ("SKEW_MIN_ANGLE", "-0.3"),
            ("SKEW_MAX_ANGLE", "0.3"),
            ("SKEW_NORMALIZE_TO_90", "TRUE"),
        ]))
        .unwrap();

        let skew = config.preprocessing.skew;
        assert_eq!(skew.sigma, 2.5);
        assert_eq!(skew.num_peaks, 8);
        assert_eq!(skew.min_deviation, 0.005);
        assert_eq!(skew.min_angle, Some(-0.3));
        assert_eq!(skew.max_angle, Some(0.3));
        assert!(skew.normalize_to_90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("SKEW_NUM_PEAKS", "many")]));
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("SKEW_NUM_PEAKS")));
    }

    #[test]
    fn test_ocr_and_logging_settings() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OCR_LANGUAGE", "eng"),
            ("OCR_INSTALLED_LANGUAGES", "eng, deu"),
            ("TESSDATA_PATH", "/usr/share/tessdata"),
            ("LOG_LEVEL", "DEBUG"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.installed_languages, vec!["eng", "deu"]);
        assert_eq!(config.ocr.tessdata_path.as_deref(), Some("/usr/share/tessdata"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_bad_sections() {
        let config = AppConfig::from_lookup(lookup_from(&[("SKEW_SIGMA", "0")])).unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_lookup(lookup_from(&[("LOG_LEVEL", "loud")])).unwrap();
        assert!(config.validate().is_err());

        assert!(AppConfig::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
