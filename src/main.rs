//! invoice-ocr - extract supplier, total and currency from invoice images

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use invoice_ocr::batch::run_batch;
use invoice_ocr::config::{self, AppConfig};
use invoice_ocr::invoice::InvoiceFields;
use invoice_ocr::vision::{OcrPipeline, RenderOptions, decode_image_file, render_records};

/// Invoice OCR - field extraction from invoice photos and scans
#[derive(Parser, Debug)]
#[command(name = "invoice-ocr")]
#[command(about = "Extract supplier name, grand total and currency from invoice images")]
struct Args {
    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the inferred invoice fields of each image as JSON
    Invoice {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Print the recognized text records of an image as JSON
    Boxes { image: PathBuf },
    /// Draw detected boxes and recognized text onto an image
    Visualize {
        image: PathBuf,
        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Process many images in parallel, one JSON line per image
    Batch {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Number of worker threads
        #[arg(short, long, default_value = "4")]
        workers: usize,
    },
    /// Write the default configuration as TOML
    InitConfig {
        /// Destination (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

/// One line of batch output
#[derive(Serialize)]
struct BatchLine<'a> {
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a InvoiceFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for JSON output
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Invoice { images } => {
            let (_, pipeline) = load_pipeline(args.config.as_deref())?;
            for image_path in &images {
                let image = decode_image_file(image_path)?;
                let report = pipeline
                    .extract_invoice(&image)
                    .with_context(|| format!("Failed to process {:?}", image_path))?;
                println!("{}", serde_json::to_string_pretty(&report.fields)?);
            }
        }
        Command::Boxes { image } => {
            let (_, pipeline) = load_pipeline(args.config.as_deref())?;
            let decoded = decode_image_file(&image)?;
            let records = pipeline.run(&decoded)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Visualize { image, output } => {
            let (app_config, pipeline) = load_pipeline(args.config.as_deref())?;
            let decoded = decode_image_file(&image)?;
            let records = pipeline.run(&decoded)?;
            let options = RenderOptions::from_config(&app_config.visualization)?;

            render_records(&decoded, &records, &options)
                .save(&output)
                .with_context(|| format!("Failed to write {:?}", output))?;
            info!("Wrote visualization of {} records to {:?}", records.len(), output);
        }
        Command::Batch { images, workers } => {
            let (_, pipeline) = load_pipeline(args.config.as_deref())?;
            let items = run_batch(&pipeline, &images, workers);
            let failed = items.iter().filter(|item| item.result.is_err()).count();

            for item in &items {
                let line = match &item.result {
                    Ok(report) => BatchLine {
                        path: &item.path,
                        fields: Some(&report.fields),
                        error: None,
                    },
                    Err(e) => BatchLine {
                        path: &item.path,
                        fields: None,
                        error: Some(e.to_string()),
                    },
                };
                println!("{}", serde_json::to_string(&line)?);
            }

            if failed > 0 {
                warn!("{} of {} images failed", failed, items.len());
            }
        }
        Command::InitConfig { path } => init_config(path.as_deref())?,
    }

    Ok(())
}

/// Load configuration and the models it names
fn load_pipeline(config_path: Option<&Path>) -> Result<(AppConfig, OcrPipeline)> {
    let app_config = load_app_config(config_path)?;
    let pipeline = OcrPipeline::from_config(&app_config)?;
    Ok((app_config, pipeline))
}

/// Load the explicit config file, else the user config file, else defaults
fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        info!("Loading configuration from {:?}", path);
        return config::load_config(path);
    }

    let default_path = config::get_config_dir()?.join("config.toml");
    if default_path.exists() {
        info!("Loading configuration from {:?}", default_path);
        config::load_config(&default_path)
    } else {
        info!("No configuration file found, using defaults");
        Ok(AppConfig::default())
    }
}

fn init_config(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::get_config_dir()?.join("config.toml"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config::save_config(&AppConfig::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
