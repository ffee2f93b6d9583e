//! Application Configuration
//!
//! Pipeline thresholds, model locations and keyword tables stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::invoice::KeywordTables;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model file locations
    pub models: ModelsConfig,
    /// Detection preprocessing and box extraction thresholds
    pub detection: DetectionConfig,
    /// Adaptive polygon expansion parameters
    pub expansion: ExpansionConfig,
    /// Recognition crop geometry
    pub recognition: RecognitionConfig,
    /// Keyword tables for field inference
    pub keywords: KeywordTables,
    /// Visualization rendering settings
    pub visualization: VisualizationConfig,
}

/// Model file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Detection model; relative paths resolve against the models directory
    pub detector_path: PathBuf,
    /// Recognition model; relative paths resolve against the models directory
    pub recognizer_path: PathBuf,
    /// Character dictionary (one symbol per line); built-in table when unset
    pub dictionary_path: Option<PathBuf>,
    /// Override for the models directory (defaults to the user data dir)
    pub models_dir: Option<PathBuf>,
    /// Intra-op threads for each ONNX session
    pub intra_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            detector_path: PathBuf::from("det.onnx"),
            recognizer_path: PathBuf::from("rec.onnx"),
            dictionary_path: None,
            models_dir: None,
            intra_threads: 4,
        }
    }
}

/// Detection-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Longer image side fed to the detector (larger images are shrunk)
    pub resize_long: u32,
    /// Heatmap binarization threshold and final box confidence floor
    pub thresh: f32,
    /// Minimum row confidence for direct-box detector outputs
    pub box_thresh: f32,
    /// Contours below this area (px²) are detector noise
    pub min_contour_area: f32,
    /// Isotropic padding applied to direct-box rows
    pub direct_box_padding: i32,
    /// Per-channel mean (R, G, B)
    pub mean: [f32; 3],
    /// Per-channel standard deviation (R, G, B)
    pub std: [f32; 3],
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            resize_long: 960,
            thresh: 0.3,
            box_thresh: 0.6,
            min_contour_area: 80.0,
            direct_box_padding: 4,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Adaptive polygon expansion parameters
///
/// Pads are `size * ratio`, clamped per axis to `[min_pad, max_pad]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub ratio_w: f32,
    pub ratio_h: f32,
    pub min_pad_w: f32,
    pub max_pad_w: f32,
    pub min_pad_h: f32,
    pub max_pad_h: f32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            ratio_w: 0.085,
            ratio_h: 0.2,
            min_pad_w: 5.0,
            max_pad_w: 30.0,
            min_pad_h: 3.0,
            max_pad_h: 15.0,
        }
    }
}

/// Recognition crop geometry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Fixed crop height fed to the recognizer
    pub target_height: u32,
    /// Fixed (padded) crop width fed to the recognizer
    pub target_width: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            target_height: 48,
            target_width: 320,
        }
    }
}

/// Visualization rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Rectangle outline thickness in pixels
    pub line_thickness: u32,
    /// TrueType/OpenType font overriding the built-in label font
    pub font_path: Option<PathBuf>,
    /// Label font size in pixels
    pub font_scale: f32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            font_path: None,
            font_scale: 16.0,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "invoiceocr", "InvoiceOcr")
        .ok_or_else(|| anyhow::anyhow!("Could not determine project directories"))
}

/// Get the application data directory (models live under `models/`)
pub fn get_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}
