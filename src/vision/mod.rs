//! Vision/OCR Layer
//!
//! Turns a decoded image into an ordered list of text records:
//! - Geometric preprocessing for the detector and recognizer
//! - Box extraction from detector output (segmentation heatmap or direct boxes)
//! - Greedy CTC decoding of recognizer output
//! - Pipeline orchestration and visualization
//!
//! The detector and recognizer themselves are external capabilities behind the
//! [`TextDetector`] and [`TextRecognizer`] traits.

pub mod boxes;
pub mod ctc;
pub mod geometry;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod visualize;

use serde::{Deserialize, Serialize, Serializer};

pub use boxes::BoxExtractor;
pub use ctc::{CharDictionary, CtcDecoder};
pub use models::{ModelPaths, OnnxDetector, OnnxRecognizer, TextDetector, TextRecognizer};
pub use pipeline::{InvoiceReport, OcrPipeline};
pub use preprocess::{PixelLayout, decode_image, decode_image_file, rgb_from_raw};
pub use visualize::{RenderOptions, render_boxes, render_records};

/// Axis-aligned text box in original-image pixel coordinates
///
/// Boxes produced by [`BoxExtractor`] satisfy `x1 < x2`, `y1 < y2` and lie
/// within the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl TextBox {
    /// Create a new text box
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Corner coordinates as `[x1, y1, x2, y2]`
    pub fn coords(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Fraction of the shorter box's height shared along the vertical axis
    ///
    /// Symmetric; 0.0 for vertically disjoint boxes or when either box has
    /// zero height, 1.0 for identical boxes.
    pub fn vertical_overlap(&self, other: &TextBox) -> f32 {
        let intersect_start = self.y1.max(other.y1);
        let intersect_end = self.y2.min(other.y2);

        if intersect_end <= intersect_start {
            return 0.0;
        }

        let min_height = self.height().min(other.height());
        if min_height <= 0 {
            return 0.0;
        }

        (intersect_end - intersect_start) as f32 / min_height as f32
    }
}

/// A detected box paired with its decoded text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRecord {
    /// Box coordinates, serialized as `[x1, y1, x2, y2]`
    #[serde(rename = "bbox", serialize_with = "serialize_bbox")]
    pub text_box: TextBox,
    /// Decoded text in original case (empty when the crop could not be read)
    pub text: String,
    /// Detection confidence of the box
    pub confidence: f32,
}

impl TextRecord {
    /// Create a new text record
    pub fn new(text_box: TextBox, text: impl Into<String>) -> Self {
        Self {
            confidence: text_box.confidence,
            text_box,
            text: text.into(),
        }
    }
}

fn serialize_bbox<S: Serializer>(text_box: &TextBox, serializer: S) -> Result<S::Ok, S::Error> {
    text_box.coords().serialize(serializer)
}
