//! Image preprocessing for OCR models
//!
//! Handles decoding, resizing, padding, normalization and tensor conversion for
//! the detection and recognition models.

use image::{RgbImage, imageops};
use ndarray::{Array3, Array4};
use std::path::Path;

use crate::error::{OcrError, Result};
use crate::vision::TextBox;

/// Detection input side lengths are padded to a multiple of this
const DETECTION_STRIDE: usize = 32;

/// Channel order of a raw pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
    /// Common for scanner and camera SDK buffers
    Bgra8,
}

impl PixelLayout {
    fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 | PixelLayout::Bgra8 => 4,
        }
    }
}

/// Normalized detection tensor together with the geometry used to build it
#[derive(Debug, Clone)]
pub struct DetectionInput {
    /// NCHW tensor, batch size 1
    pub tensor: Array4<f32>,
    /// Size after aspect-preserving resize, before padding (width, height)
    pub resized: (u32, u32),
    /// Left and top padding applied to center the resized image
    pub offset: (u32, u32),
    /// Resize factor applied to the source image
    pub scale: f32,
}

/// Decode an encoded image (PNG, JPEG, ...) into RGB
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| OcrError::InvalidInput(format!("cannot decode image: {e}")))?;
    ensure_non_empty(decoded.width(), decoded.height())?;
    Ok(decoded.to_rgb8())
}

/// Load and decode an image file into RGB
pub fn decode_image_file(path: &Path) -> Result<RgbImage> {
    let bytes = std::fs::read(path)
        .map_err(|e| OcrError::InvalidInput(format!("cannot read {:?}: {e}", path)))?;
    decode_image(&bytes)
}

/// Build an RGB image from a raw pixel buffer in the given channel order
pub fn rgb_from_raw(data: &[u8], width: u32, height: u32, layout: PixelLayout) -> Result<RgbImage> {
    ensure_non_empty(width, height)?;

    let bpp = layout.bytes_per_pixel();
    let expected = width as usize * height as usize * bpp;
    if data.len() != expected {
        return Err(OcrError::InvalidInput(format!(
            "buffer holds {} bytes, expected {} for {}x{} {:?}",
            data.len(),
            expected,
            width,
            height,
            layout
        )));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in data.chunks_exact(bpp) {
        match layout {
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => rgb.extend_from_slice(&px[..3]),
            PixelLayout::Bgra8 => rgb.extend_from_slice(&[px[2], px[1], px[0]]),
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| OcrError::InvalidInput("pixel buffer does not fit image".to_string()))
}

fn ensure_non_empty(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidInput(format!(
            "image has zero area ({}x{})",
            width, height
        )));
    }
    Ok(())
}

/// Convert an RGB image to an HWC f32 array scaled to 0-1
pub fn rgb_to_f32(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut rgb = Array3::<f32>::zeros((height as usize, width as usize, 3));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            rgb[[y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }

    rgb
}

/// Normalize image with mean and std
pub fn normalize(image: &Array3<f32>, mean: &[f32; 3], std: &[f32; 3]) -> Array3<f32> {
    let mut normalized = image.clone();

    for ((_, _, c), value) in normalized.indexed_iter_mut() {
        *value = (*value - mean[c]) / std[c];
    }

    normalized
}

/// Convert HWC image to NCHW tensor (batch size 1)
pub fn hwc_to_nchw(image: &Array3<f32>) -> Array4<f32> {
    let (h, w, c) = image.dim();
    let mut tensor = Array4::<f32>::zeros((1, c, h, w));

    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                tensor[[0, ch, y, x]] = image[[y, x, ch]];
            }
        }
    }

    tensor
}

/// Bilinear resize of an HWC array to exactly `new_h` x `new_w`
pub fn resize_bilinear(image: &Array3<f32>, new_h: usize, new_w: usize) -> Array3<f32> {
    let (h, w, c) = image.dim();
    if (h, w) == (new_h, new_w) {
        return image.clone();
    }

    let mut resized = Array3::<f32>::zeros((new_h, new_w, c));
    if h == 0 || w == 0 {
        return resized;
    }

    let scale_y = new_h as f32 / h as f32;
    let scale_x = new_w as f32 / w as f32;

    for y in 0..new_h {
        let src_y = (y as f32 / scale_y).min(h as f32 - 1.0);
        let y0 = src_y.floor() as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = src_y - y0 as f32;

        for x in 0..new_w {
            let src_x = (x as f32 / scale_x).min(w as f32 - 1.0);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = src_x - x0 as f32;

            for ch in 0..c {
                let v00 = image[[y0, x0, ch]];
                let v01 = image[[y0, x1, ch]];
                let v10 = image[[y1, x0, ch]];
                let v11 = image[[y1, x1, ch]];

                let v0 = v00 * (1.0 - fx) + v01 * fx;
                let v1 = v10 * (1.0 - fx) + v11 * fx;
                resized[[y, x, ch]] = v0 * (1.0 - fy) + v1 * fy;
            }
        }
    }

    resized
}

/// Size after shrinking so the longer side equals `target_long_side`
///
/// Images whose longer side already fits are left unchanged.
pub fn detection_size(width: u32, height: u32, target_long_side: u32) -> (u32, u32) {
    if width.max(height) <= target_long_side {
        return (width, height);
    }

    if height > width {
        let new_w = (width as u64 * target_long_side as u64 / height as u64) as u32;
        (new_w.max(1), target_long_side)
    } else {
        let new_h = (height as u64 * target_long_side as u64 / width as u64) as u32;
        (target_long_side, new_h.max(1))
    }
}

/// Pad an HWC array with zeros, centered, to multiples of 32 on both axes
///
/// Returns the padded array and the (left, top) offset of the original content.
pub fn pad_to_stride(image: &Array3<f32>) -> (Array3<f32>, (usize, usize)) {
    let (h, w, c) = image.dim();
    let padded_h = h.div_ceil(DETECTION_STRIDE) * DETECTION_STRIDE;
    let padded_w = w.div_ceil(DETECTION_STRIDE) * DETECTION_STRIDE;

    let pad_top = (padded_h - h) / 2;
    let pad_left = (padded_w - w) / 2;

    let mut padded = Array3::<f32>::zeros((padded_h, padded_w, c));
    padded
        .slice_mut(ndarray::s![pad_top..pad_top + h, pad_left..pad_left + w, ..])
        .assign(image);

    (padded, (pad_left, pad_top))
}

/// Full preprocessing pipeline for detection
///
/// Shrinks to `target_long_side`, zero-pads centered to a multiple of 32,
/// normalizes with per-channel mean/std and lays out as NCHW.
pub fn prepare_detection(
    image: &RgbImage,
    target_long_side: u32,
    mean: &[f32; 3],
    std: &[f32; 3],
) -> Result<DetectionInput> {
    let (width, height) = image.dimensions();
    ensure_non_empty(width, height)?;

    // 1. Convert to f32 RGB
    let rgb = rgb_to_f32(image);

    // 2. Resize while maintaining aspect ratio
    let (new_w, new_h) = detection_size(width, height, target_long_side);
    let resized = resize_bilinear(&rgb, new_h as usize, new_w as usize);

    // 3. Pad centered with black pixels
    let (padded, (pad_left, pad_top)) = pad_to_stride(&resized);

    // 4. Normalize
    let normalized = normalize(&padded, mean, std);

    // 5. Convert to NCHW tensor
    let tensor = hwc_to_nchw(&normalized);

    Ok(DetectionInput {
        tensor,
        resized: (new_w, new_h),
        offset: (pad_left as u32, pad_top as u32),
        scale: new_w as f32 / width as f32,
    })
}

/// Full preprocessing pipeline for recognition
///
/// Scales to `target_height`, caps the width at `target_width` and right-pads
/// with zeros to exactly `target_width`. Pixels are scaled to 0-1 without
/// mean/std normalization.
pub fn prepare_recognition(crop: &RgbImage, target_height: u32, target_width: u32) -> Result<Array4<f32>> {
    let (width, height) = crop.dimensions();
    ensure_non_empty(width, height)?;

    let scale = target_height as f32 / height as f32;
    let new_w = ((width as f32 * scale) as u32).clamp(1, target_width.max(1));

    let rgb = rgb_to_f32(crop);
    let resized = resize_bilinear(&rgb, target_height as usize, new_w as usize);

    let mut padded = Array3::<f32>::zeros((target_height as usize, target_width as usize, 3));
    padded
        .slice_mut(ndarray::s![.., ..new_w as usize, ..])
        .assign(&resized);

    Ok(hwc_to_nchw(&padded))
}

/// Crop the original image to a box; `None` when the clamped crop has no area
pub fn crop_box(image: &RgbImage, text_box: &TextBox) -> Option<RgbImage> {
    let (img_w, img_h) = image.dimensions();

    let x1 = text_box.x1.clamp(0, img_w as i32) as u32;
    let y1 = text_box.y1.clamp(0, img_h as i32) as u32;
    let x2 = text_box.x2.clamp(0, img_w as i32) as u32;
    let y2 = text_box.y2.clamp(0, img_h as i32) as u32;

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_from_raw_bgra() {
        let bgra = vec![
            255, 0, 0, 255, // Blue
            0, 0, 255, 255, // Red
        ];

        let rgb = rgb_from_raw(&bgra, 2, 1, PixelLayout::Bgra8).unwrap();

        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_rgb_from_raw_rejects_bad_input() {
        assert!(matches!(
            rgb_from_raw(&[], 0, 0, PixelLayout::Rgb8),
            Err(OcrError::InvalidInput(_))
        ));
        assert!(matches!(
            rgb_from_raw(&[1, 2, 3], 2, 1, PixelLayout::Rgb8),
            Err(OcrError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_image_garbage() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(OcrError::InvalidInput(_))));
    }

    #[test]
    fn test_hwc_to_nchw() {
        let hwc = Array3::<f32>::from_shape_fn((10, 20, 3), |(h, w, c)| {
            (h * 100 + w * 10 + c) as f32
        });

        let nchw = hwc_to_nchw(&hwc);

        assert_eq!(nchw.dim(), (1, 3, 10, 20));
        assert_eq!(nchw[[0, 1, 5, 10]], hwc[[5, 10, 1]]);
    }

    #[test]
    fn test_normalize() {
        let image = Array3::<f32>::from_elem((2, 2, 3), 0.5);
        let mean = [0.485, 0.456, 0.406];
        let std = [0.229, 0.224, 0.225];

        let normalized = normalize(&image, &mean, &std);

        assert!((normalized[[0, 0, 0]] - (0.5 - 0.485) / 0.229).abs() < 1e-5);
        assert!((normalized[[1, 1, 2]] - (0.5 - 0.406) / 0.225).abs() < 1e-5);
    }

    #[test]
    fn test_detection_size_shrinks_only_oversized() {
        assert_eq!(detection_size(1920, 1080, 960), (960, 540));
        assert_eq!(detection_size(1000, 2000, 960), (480, 960));
        assert_eq!(detection_size(640, 480, 960), (640, 480));
    }

    #[test]
    fn test_pad_to_stride_centers_content() {
        let image = Array3::<f32>::from_elem((40, 50, 3), 1.0);
        let (padded, (left, top)) = pad_to_stride(&image);

        assert_eq!(padded.dim(), (64, 64, 3));
        // 24 rows of padding: 12 top, 12 bottom; 14 columns: 7 left, 7 right
        assert_eq!((left, top), (7, 12));
        assert_eq!(padded[[11, 20, 0]], 0.0);
        assert_eq!(padded[[12, 7, 0]], 1.0);
        assert_eq!(padded[[51, 56, 2]], 1.0);
        assert_eq!(padded[[52, 56, 2]], 0.0);
    }

    #[test]
    fn test_prepare_detection_shape() {
        let image = RgbImage::from_pixel(100, 50, Rgb([255, 255, 255]));
        let input = prepare_detection(
            &image,
            960,
            &[0.485, 0.456, 0.406],
            &[0.229, 0.224, 0.225],
        )
        .unwrap();

        assert_eq!(input.tensor.dim(), (1, 3, 64, 128));
        assert_eq!(input.resized, (100, 50));
        assert_eq!(input.offset, (14, 7));
        // Padding is black before normalization
        let pad_value = (0.0 - 0.485) / 0.229;
        assert!((input.tensor[[0, 0, 0, 0]] - pad_value).abs() < 1e-5);
        let content_value = (1.0 - 0.485) / 0.229;
        assert!((input.tensor[[0, 0, 30, 60]] - content_value).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_detection_rejects_empty() {
        let image = RgbImage::new(0, 10);
        let result = prepare_detection(&image, 960, &[0.5; 3], &[0.5; 3]);
        assert!(matches!(result, Err(OcrError::InvalidInput(_))));
    }

    #[test]
    fn test_prepare_recognition_right_pads() {
        let crop = RgbImage::from_pixel(40, 24, Rgb([255, 255, 255]));
        let tensor = prepare_recognition(&crop, 48, 320).unwrap();

        assert_eq!(tensor.dim(), (1, 3, 48, 320));
        // 40 * 2 = 80 columns of content, the rest is zero padding on the right
        assert!((tensor[[0, 0, 10, 0]] - 1.0).abs() < 1e-5);
        assert!((tensor[[0, 2, 47, 79]] - 1.0).abs() < 1e-5);
        assert_eq!(tensor[[0, 0, 10, 80]], 0.0);
        assert_eq!(tensor[[0, 1, 47, 319]], 0.0);
    }

    #[test]
    fn test_prepare_recognition_caps_width() {
        let crop = RgbImage::from_pixel(1000, 20, Rgb([128, 128, 128]));
        let tensor = prepare_recognition(&crop, 48, 320).unwrap();

        assert_eq!(tensor.dim(), (1, 3, 48, 320));
        assert!(tensor[[0, 0, 24, 319]] > 0.0);
    }

    #[test]
    fn test_crop_box() {
        let image = RgbImage::from_pixel(100, 50, Rgb([10, 20, 30]));

        let crop = crop_box(&image, &TextBox::new(10, 5, 40, 25, 0.9)).unwrap();
        assert_eq!(crop.dimensions(), (30, 20));

        assert!(crop_box(&image, &TextBox::new(100, 5, 120, 25, 0.9)).is_none());
    }
}
