//! Invoice OCR - text detection post-processing and invoice field inference
//!
//! Turns detector and recognizer model outputs into positioned text records,
//! then infers the supplier name, grand total and currency of an invoice
//! from those records.

pub mod batch;
pub mod config;
pub mod error;
pub mod invoice;
pub mod vision;

pub use error::{OcrError, Result};
pub use invoice::{FieldInferenceEngine, InvoiceFields};
pub use vision::{OcrPipeline, TextBox, TextRecord};
