//! Observability module for logging setup and metrics recording.
//!
//! This module provides:
//! - Structured logging with configurable level and output format
//! - Metrics recording through the `metrics` facade
//!
//! No metrics exporter is installed here. Without a recorder the `metrics`
//! macros are no-ops, so library users decide where the numbers go.

use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::prelude::*;

use crate::config::{LogFormat, LoggingConfig};

/// Initialize tracing with the given logging configuration.
///
/// `RUST_LOG` directives are honored and extended with the configured level
/// for this crate. Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("receipt_reader={}", config.level).parse()?)
        .add_directive(format!("receipt_preprocessing={}", config.level).parse()?);

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?,
    }

    tracing::info!(
        log_level = %config.level,
        log_format = ?config.format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Record the outcome and duration of a full preprocessing run
pub fn record_preprocessing_metrics(duration: Duration, success: bool) {
    metrics::counter!("receipt_preprocessing_total", "result" => if success { "success" } else { "failure" })
        .increment(1);
    metrics::histogram!("receipt_preprocessing_duration_seconds").record(duration.as_secs_f64());
}

/// Record the duration of one pipeline stage
pub fn record_stage_duration(stage: &'static str, duration: Duration) {
    metrics::histogram!("receipt_preprocessing_stage_duration_seconds", "stage" => stage)
        .record(duration.as_secs_f64());
}

/// Record the outcome and duration of a text recognition call
pub fn record_ocr_metrics(success: bool, duration: Duration) {
    metrics::counter!("ocr_operations_total", "result" => if success { "success" } else { "failure" })
        .increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        record_preprocessing_metrics(Duration::from_millis(12), true);
        record_preprocessing_metrics(Duration::from_millis(3), false);
        record_stage_duration("deskew", Duration::from_millis(5));
        record_ocr_metrics(true, Duration::from_millis(40));
    }

    #[test]
    fn test_invalid_level_fails_to_build_filter() {
        let config = LoggingConfig {
            level: "not a level!".to_string(),
            format: LogFormat::Pretty,
        };
        assert!(init_tracing(&config).is_err());
    }
}
