//! Visualization of detected boxes and recognized text

use std::sync::LazyLock;

use ab_glyph::{FontArc, PxScale};
use anyhow::Context;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::VisualizationConfig;
use crate::vision::{TextBox, TextRecord};

/// Box outline color
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Built-in label font
static DEFAULT_FONT: LazyLock<FontArc> = LazyLock::new(|| {
    FontArc::try_from_slice(include_bytes!("../../assets/DejaVuSansMono.ttf"))
        .expect("valid embedded font")
});

/// Rendering options
#[derive(Clone)]
pub struct RenderOptions {
    pub color: Rgb<u8>,
    pub line_thickness: u32,
    pub font: FontArc,
    pub font_scale: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: BOX_COLOR,
            line_thickness: 2,
            font: DEFAULT_FONT.clone(),
            font_scale: 16.0,
        }
    }
}

impl RenderOptions {
    /// Build options from configuration; `font_path` overrides the built-in font
    pub fn from_config(config: &VisualizationConfig) -> anyhow::Result<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read font {:?}", path))?;
                FontArc::try_from_vec(data)
                    .map_err(|e| anyhow::anyhow!("Invalid font {:?}: {}", path, e))?
            }
            None => DEFAULT_FONT.clone(),
        };

        Ok(Self {
            color: BOX_COLOR,
            line_thickness: config.line_thickness,
            font,
            font_scale: config.font_scale,
        })
    }
}

/// Draw each record's box and its text just above the box
pub fn render_records(image: &RgbImage, records: &[TextRecord], options: &RenderOptions) -> RgbImage {
    let mut canvas = image.clone();
    for record in records {
        draw_box(&mut canvas, &record.text_box, options);
        if !record.text.is_empty() {
            draw_label(&mut canvas, &record.text_box, &record.text, options);
        }
    }
    canvas
}

/// Draw boxes labelled with their 1-based index and confidence
pub fn render_boxes(image: &RgbImage, boxes: &[TextBox], options: &RenderOptions) -> RgbImage {
    let mut canvas = image.clone();
    for (i, text_box) in boxes.iter().enumerate() {
        draw_box(&mut canvas, text_box, options);
        let label = format!("{}: {:.2}", i + 1, text_box.confidence);
        draw_label(&mut canvas, text_box, &label, options);
    }
    canvas
}

fn draw_box(canvas: &mut RgbImage, text_box: &TextBox, options: &RenderOptions) {
    let (img_w, img_h) = canvas.dimensions();
    let x1 = text_box.x1.clamp(0, img_w as i32);
    let y1 = text_box.y1.clamp(0, img_h as i32);
    let x2 = text_box.x2.clamp(0, img_w as i32);
    let y2 = text_box.y2.clamp(0, img_h as i32);

    // Nested outlines for thickness
    for t in 0..options.line_thickness.max(1) as i32 {
        let w = x2 - x1 - 2 * t;
        let h = y2 - y1 - 2 * t;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, options.color);
    }
}

fn draw_label(canvas: &mut RgbImage, text_box: &TextBox, text: &str, options: &RenderOptions) {
    // Above the box, kept inside the image
    let y = (text_box.y1 - options.font_scale.ceil() as i32 - 2).max(0);
    let x = text_box.x1.max(0);
    draw_text_mut(canvas, options.color, x, y, PxScale::from(options.font_scale), &options.font, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    /// Count non-white pixels in `[x1, x2) x [y1, y2)`
    fn inked(canvas: &RgbImage, x1: u32, y1: u32, x2: u32, y2: u32) -> usize {
        (y1..y2)
            .flat_map(|y| (x1..x2).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.get_pixel(x, y) != &Rgb([255, 255, 255]))
            .count()
    }

    #[test]
    fn test_render_records_draws_outline() {
        let image = white(100, 60);
        let records = vec![TextRecord::new(TextBox::new(10, 10, 50, 40, 0.9), "Total")];

        let canvas = render_records(&image, &records, &RenderOptions::default());

        assert_eq!(canvas.get_pixel(10, 10), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(11, 20), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(30, 25), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 255, 255]));
        // Input left untouched
        assert_eq!(image.get_pixel(10, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_render_boxes_clamps_to_image() {
        let image = white(40, 40);
        let boxes = vec![TextBox::new(-5, -5, 60, 60, 0.5), TextBox::new(20, 20, 20, 30, 0.5)];

        let options = RenderOptions {
            line_thickness: 1,
            ..Default::default()
        };
        let canvas = render_boxes(&image, &boxes, &options);

        assert_eq!(canvas.dimensions(), (40, 40));
        assert_eq!(canvas.get_pixel(0, 0), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(39, 39), &BOX_COLOR);
    }

    #[test]
    fn test_render_records_draws_text_with_default_font() {
        let image = white(120, 80);
        let records = vec![TextRecord::new(TextBox::new(10, 40, 100, 70, 0.9), "Total")];

        let canvas = render_records(&image, &records, &RenderOptions::default());

        // Label band sits between y = 40 - 16 - 2 and the box top
        assert!(inked(&canvas, 10, 22, 100, 40) > 0);
        assert_eq!(inked(&canvas, 0, 0, 120, 20), 0);
    }

    #[test]
    fn test_render_records_skips_empty_text() {
        let image = white(120, 80);
        let records = vec![TextRecord::new(TextBox::new(10, 40, 100, 70, 0.9), "")];

        let canvas = render_records(&image, &records, &RenderOptions::default());

        assert_eq!(inked(&canvas, 0, 0, 120, 40), 0);
    }

    #[test]
    fn test_render_boxes_labels_from_one() {
        let image = white(200, 80);
        let boxes = vec![TextBox::new(10, 40, 190, 70, 0.5)];
        let options = RenderOptions::default();

        let canvas = render_boxes(&image, &boxes, &options);

        let mut expected = white(200, 80);
        draw_label(&mut expected, &boxes[0], "1: 0.50", &options);
        for y in 0..40 {
            for x in 0..200 {
                assert_eq!(canvas.get_pixel(x, y), expected.get_pixel(x, y), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_from_config_missing_font() {
        let config = VisualizationConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..Default::default()
        };
        assert!(RenderOptions::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_uses_builtin_font() {
        let options = RenderOptions::from_config(&VisualizationConfig::default()).unwrap();
        assert_eq!(options.line_thickness, 2);

        let records = vec![TextRecord::new(TextBox::new(10, 40, 100, 70, 0.9), "Total")];
        let canvas = render_records(&white(120, 80), &records, &options);
        assert!(inked(&canvas, 10, 22, 100, 40) > 0);
    }
}
