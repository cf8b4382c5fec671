use anyhow::Result;
use clap::Parser;
use receipt_reader::config::{AppConfig, LoggingConfig};
use receipt_reader::errors::error_logging;
use receipt_reader::ocr::{TesseractRecognizer, TextRecognizer};
use receipt_reader::preprocessing::{snap_to_binary, Preprocessor};
use receipt_reader::{image_io, observability, serialization};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "receipt-reader",
    version,
    about = "Preprocess receipt photos for OCR"
)]
struct CliArgs {
    /// Receipt image to process
    input: PathBuf,
    /// Output image path, or base name of the JSON file with --json
    output: String,
    /// Write the run-length JSON form instead of an image
    #[arg(long)]
    json: bool,
    /// Print the recognized text
    #[arg(long)]
    ocr: bool,
    /// OCR language (defaults to OCR_LANGUAGE or 'pol')
    #[arg(long)]
    lang: Option<String>,
}

/// Validate configuration, reporting failures through default-level tracing
/// since the configured subscriber is only installed after validation.
fn validated_config(config: AppConfig) -> Result<AppConfig> {
    if let Err(e) = config.validate() {
        observability::init_tracing(&LoggingConfig::default()).ok();
        error_logging::log_config_error(&e, "environment", "startup validation");
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = CliArgs::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = validated_config(AppConfig::from_env()?)?;
    observability::init_tracing(&config.logging)?;
    info!("{}", config.summary());

    let image = image_io::load_image(&cli.input).map_err(|e| {
        error_logging::log_filesystem_error(&e, "load_image", cli.input.to_str());
        e
    })?;

    let start_time = Instant::now();
    let preprocessor = Preprocessor::with_skew_config(config.preprocessing.skew)?;
    let processed = preprocessor.preprocess(&image).map_err(|e| {
        error_logging::log_preprocessing_error(
            &e,
            "preprocess",
            Some((image.width(), image.height())),
            Some(start_time.elapsed()),
        );
        e
    })?;
    let gray = processed.to_luma8();

    if cli.json {
        // Rotation leaves interpolated edge samples the JSON form cannot hold
        let path = serialization::save_to_json(&cli.output, &snap_to_binary(&gray))?;
        info!(path = %path.display(), "Preprocessed receipt written as JSON");
    } else {
        image_io::save_image(&cli.output, &processed)?;
        info!(path = %cli.output, "Preprocessed receipt written");
    }

    if cli.ocr {
        let recognizer = TesseractRecognizer::new(config.ocr.clone());
        let language = cli.lang.as_deref().unwrap_or(&config.ocr.language);
        let ocr_start = Instant::now();
        let text = recognizer.recognize_text(&gray, language).map_err(|e| {
            error_logging::log_ocr_error(&e, "recognize_text", Some(language), Some(ocr_start.elapsed()));
            e
        })?;
        println!("{}", text);
    }

    Ok(())
}
