//! Error types for the OCR core
//!
//! Every failure that leaves the library is one of these variants. The field
//! inference engine never fails; absence of a field is a valid outcome.

use thiserror::Error;

/// Errors surfaced by preprocessing, box extraction, decoding and inference
#[derive(Error, Debug)]
pub enum OcrError {
    /// Image or crop is empty, undecodable or has an inconsistent buffer size
    #[error("Invalid input image: {0}")]
    InvalidInput(String),

    /// Detector output matches neither the segmentation nor the direct-box form
    #[error("Unsupported detector output shape: {0:?}")]
    UnsupportedOutputShape(Vec<usize>),

    /// Recognizer output could not be decoded into text
    #[error("Failed to decode recognizer output: {0}")]
    DecodeFailure(String),

    /// Detector or recognizer capability failed while running
    #[error("Model inference failed: {0}")]
    Inference(String),

    /// Detector or recognizer capability could not be constructed
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, OcrError>;
