//! YOLO pre/post-processing: letterboxing, output decoding and NMS
//!
//! Pure functions over plain buffers so they can be tested without a model.

use super::{BoundingBox, Detection};
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Default square model input
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Gray used to pad letterboxed images
const PAD_VALUE: u8 = 114;

/// IoU above which a lower-scoring box of the same class is suppressed
pub const NMS_IOU_THRESHOLD: f32 = 0.7;

/// Mapping from page pixels into the letterboxed model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn new(source_width: u32, source_height: u32, size: u32) -> Self {
        let scale = (size as f32 / source_width.max(1) as f32)
            .min(size as f32 / source_height.max(1) as f32);
        let (new_w, new_h) = Self::scaled_dims(source_width, source_height, scale);
        Self {
            scale,
            pad_x: ((size - new_w) / 2) as f32,
            pad_y: ((size - new_h) / 2) as f32,
            source_width,
            source_height,
        }
    }

    fn scaled_dims(width: u32, height: u32, scale: f32) -> (u32, u32) {
        (
            ((width as f32 * scale).round() as u32).max(1),
            ((height as f32 * scale).round() as u32).max(1),
        )
    }

    /// Map a box from model-input space back onto the source page, clamped
    pub fn unmap(&self, bbox: BoundingBox) -> BoundingBox {
        let w = self.source_width as f32;
        let h = self.source_height as f32;
        BoundingBox {
            x1: ((bbox.x1 - self.pad_x) / self.scale).clamp(0.0, w),
            y1: ((bbox.y1 - self.pad_y) / self.scale).clamp(0.0, h),
            x2: ((bbox.x2 - self.pad_x) / self.scale).clamp(0.0, w),
            y2: ((bbox.y2 - self.pad_y) / self.scale).clamp(0.0, h),
        }
    }
}

/// Letterbox a page into a `size`x`size` NCHW `f32` tensor in `[0, 1]`
pub fn preprocess(image: &PageImage, size: u32) -> Result<(Vec<f32>, Letterbox)> {
    let rgb = image.to_rgb_image()?;
    let letterbox = Letterbox::new(image.width, image.height, size);
    let (new_w, new_h) = Letterbox::scaled_dims(image.width, image.height, letterbox.scale);

    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::replace(
        &mut canvas,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );

    let plane = (size * size) as usize;
    let mut tensor = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for c in 0..3 {
            tensor[c * plane + offset] = pixel.0[c] as f32 / 255.0;
        }
    }

    Ok((tensor, letterbox))
}

/// Decode a raw `[1, 4 + classes, anchors]` (or transposed) output into
/// page-space detections scoring above `confidence`, after NMS.
pub fn decode(
    shape: &[i64],
    data: &[f32],
    confidence: f32,
    letterbox: &Letterbox,
) -> Result<Vec<Detection>> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(Error::Detection {
            reason: format!("Unexpected output shape: {:?}", shape),
        });
    }
    let (d1, d2) = (shape[1] as usize, shape[2] as usize);
    // anchors always outnumber box attributes
    let channels_first = d1 <= d2;
    let (attrs, anchors) = if channels_first { (d1, d2) } else { (d2, d1) };

    if attrs < 5 || data.len() != attrs * anchors {
        return Err(Error::Detection {
            reason: format!(
                "Output shape {:?} does not match {} values",
                shape,
                data.len()
            ),
        });
    }

    let at = |anchor: usize, attr: usize| {
        if channels_first {
            data[attr * anchors + anchor]
        } else {
            data[anchor * attrs + attr]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..attrs)
            .map(|attr| (attr - 4, at(anchor, attr)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score <= confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(anchor, 0), at(anchor, 1), at(anchor, 2), at(anchor, 3));
        let bbox = letterbox.unmap(BoundingBox {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        });
        candidates.push(Detection {
            class_id,
            confidence: score,
            bbox,
        });
    }

    Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
}

/// Greedy per-class non-maximum suppression, highest confidence first
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
