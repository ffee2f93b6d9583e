//! Box extraction from detector output
//!
//! Two detector output forms are understood:
//! - **Segmentation** (DBNet-style probability heatmap, at most 3 channels):
//!   thresholded into a mask, contoured, fitted with minimum-area rectangles
//!   and adaptively expanded.
//! - **Direct boxes** (one `x1, y1, x2, y2, confidence, ...` row per detection,
//!   optionally normalized to 0-1).
//!
//! Any other shape yields no boxes and a warning.

use image::{GrayImage, Luma, imageops};
use imageproc::contours::{BorderType, find_contours};
use ndarray::{Array2, ArrayView2, ArrayViewD, Axis, Ix2, s};
use tracing::{debug, info, warn};

use crate::config::{DetectionConfig, ExpansionConfig};
use crate::error::{OcrError, Result};
use crate::vision::TextBox;
use crate::vision::geometry::{self, Point};
use crate::vision::preprocess::resize_bilinear;

/// Layout of a detector output tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputForm {
    /// `[N, C, H, W]` probability map with `C <= 3`
    Segmentation,
    /// `[N, rows, cols]` or `[rows, cols]` with `cols >= 5`
    DirectBoxes,
}

/// Identify the output form from the tensor shape
///
/// Empty batch, channel or spatial axes are unsupported.
pub fn classify_output(shape: &[usize]) -> Result<OutputForm> {
    match shape {
        [n, c, h, w] if *n > 0 && (1..=3).contains(c) && *h > 0 && *w > 0 => {
            Ok(OutputForm::Segmentation)
        }
        [n, _, cols] if *n > 0 && *cols >= 5 => Ok(OutputForm::DirectBoxes),
        [_, cols] if *cols >= 5 => Ok(OutputForm::DirectBoxes),
        _ => Err(OcrError::UnsupportedOutputShape(shape.to_vec())),
    }
}

/// Converts detector output into filtered, expanded pixel-space boxes
#[derive(Debug, Clone)]
pub struct BoxExtractor {
    /// Heatmap binarization threshold and final confidence floor
    thresh: f32,
    /// Row confidence floor for direct-box outputs
    box_thresh: f32,
    /// Contour noise floor in px²
    min_contour_area: f32,
    /// Isotropic padding for direct-box rows
    direct_box_padding: i32,
    expansion: ExpansionConfig,
}

impl BoxExtractor {
    /// Create an extractor from detection thresholds and expansion parameters
    pub fn new(detection: &DetectionConfig, expansion: ExpansionConfig) -> Self {
        Self {
            thresh: detection.thresh,
            box_thresh: detection.box_thresh,
            min_contour_area: detection.min_contour_area,
            direct_box_padding: detection.direct_box_padding,
            expansion,
        }
    }

    /// Extract boxes for an image of `image_size` (width, height)
    ///
    /// Boxes come back in contour/row discovery order. Every returned box
    /// satisfies `x1 < x2`, `y1 < y2`, lies within the image and has a
    /// confidence in `[thresh, 1]`.
    pub fn extract(&self, output: ArrayViewD<f32>, image_size: (u32, u32)) -> Vec<TextBox> {
        let form = match classify_output(output.shape()) {
            Ok(form) => form,
            Err(e) => {
                warn!("{}; treating as zero boxes", e);
                return vec![];
            }
        };

        debug!("Detector output shape {:?} read as {:?}", output.shape(), form);

        let boxes = match form {
            OutputForm::Segmentation => heatmap_plane(output)
                .map(|heatmap| self.extract_segmentation(heatmap, image_size))
                .unwrap_or_default(),
            OutputForm::DirectBoxes => detection_rows(output)
                .map(|rows| self.extract_direct(rows, image_size))
                .unwrap_or_default(),
        };

        let before = boxes.len();
        let boxes: Vec<TextBox> = boxes
            .into_iter()
            .filter(|b| b.confidence >= self.thresh)
            .collect();

        info!(
            "Extracted {} boxes ({} before confidence filter {})",
            boxes.len(),
            before,
            self.thresh
        );

        boxes
    }

    /// Contour a probability heatmap into expanded axis-aligned boxes
    pub fn extract_segmentation(&self, heatmap: ArrayView2<f32>, image_size: (u32, u32)) -> Vec<TextBox> {
        let (width, height) = image_size;
        if width == 0 || height == 0 {
            return vec![];
        }

        let (map_h, map_w) = heatmap.dim();
        let binary = GrayImage::from_fn(map_w as u32, map_h as u32, |x, y| {
            if heatmap[[y as usize, x as usize]] > self.thresh {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        // Back to original image resolution
        let mask = if (map_w as u32, map_h as u32) == image_size {
            binary
        } else {
            imageops::resize(&binary, width, height, imageops::FilterType::Nearest)
        };
        let scores = resize_plane(heatmap, height as usize, width as usize);

        let contours = find_contours::<i32>(&mask);
        debug!("Found {} contours", contours.len());

        let mut boxes = Vec::new();
        for contour in contours
            .iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        {
            let points: Vec<Point> = contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect();

            if geometry::polygon_area(&points) < self.min_contour_area {
                continue;
            }

            let Some(rect) = geometry::min_area_rect(&points) else {
                continue;
            };

            let expanded = geometry::expand_polygon_adaptive(&rect, &self.expansion);

            let x1 = expanded.iter().map(|p| p.0).min().unwrap_or(0).max(0);
            let y1 = expanded.iter().map(|p| p.1).min().unwrap_or(0).max(0);
            let x2 = expanded.iter().map(|p| p.0).max().unwrap_or(0).min(width as i32);
            let y2 = expanded.iter().map(|p| p.1).max().unwrap_or(0).min(height as i32);

            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            let confidence = region_mean(&scores, x1, y1, x2, y2).clamp(0.0, 1.0);
            boxes.push(TextBox::new(x1, y1, x2, y2, confidence));
        }

        boxes
    }

    /// Convert direct detection rows into padded, clamped boxes
    pub fn extract_direct(&self, rows: ArrayView2<f32>, image_size: (u32, u32)) -> Vec<TextBox> {
        let (width, height) = image_size;
        let (w, h) = (width as i32, height as i32);
        let pad = self.direct_box_padding;

        let mut boxes = Vec::new();
        for row in rows.outer_iter() {
            let confidence = row[4];
            if confidence < self.box_thresh {
                continue;
            }

            let (x1, y1, x2, y2) = if row[2] <= 1.0 {
                // Normalized coordinates
                (
                    (row[0] * width as f32) as i32,
                    (row[1] * height as f32) as i32,
                    (row[2] * width as f32) as i32,
                    (row[3] * height as f32) as i32,
                )
            } else {
                (row[0] as i32, row[1] as i32, row[2] as i32, row[3] as i32)
            };

            let x1 = (x1 - pad).max(0);
            let y1 = (y1 - pad).max(0);
            let x2 = (x2 + pad).min(w);
            let y2 = (y2 + pad).min(h);

            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            boxes.push(TextBox::new(x1, y1, x2, y2, confidence.clamp(0.0, 1.0)));
        }

        boxes
    }
}

/// First channel of the first batch item of a segmentation output
fn heatmap_plane(output: ArrayViewD<'_, f32>) -> Option<ArrayView2<'_, f32>> {
    let mut view = output;
    while view.ndim() > 2 {
        view = view.index_axis_move(Axis(0), 0);
    }
    view.into_dimensionality::<Ix2>().ok()
}

/// Detection rows of the first batch item
fn detection_rows(output: ArrayViewD<'_, f32>) -> Option<ArrayView2<'_, f32>> {
    let mut view = output;
    if view.ndim() == 3 {
        view = view.index_axis_move(Axis(0), 0);
    }
    view.into_dimensionality::<Ix2>().ok()
}

/// Bilinear resize of a single-channel map to `new_h` x `new_w`
fn resize_plane(plane: ArrayView2<f32>, new_h: usize, new_w: usize) -> Array2<f32> {
    let stacked = plane.to_owned().insert_axis(Axis(2));
    resize_bilinear(&stacked, new_h, new_w).index_axis_move(Axis(2), 0)
}

/// Mean value of `[y1, y2) x [x1, x2)`, 0.0 for an empty region
fn region_mean(scores: &Array2<f32>, x1: i32, y1: i32, x2: i32, y2: i32) -> f32 {
    let (h, w) = scores.dim();
    let (x1, x2) = ((x1.max(0) as usize).min(w), (x2.max(0) as usize).min(w));
    let (y1, y2) = ((y1.max(0) as usize).min(h), (y2.max(0) as usize).min(h));

    let region = scores.slice(s![y1..y2, x1..x2]);
    region.mean().unwrap_or(0.0)
}
