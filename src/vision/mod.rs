//! Visual identity-card detection over rasterized pages

#[cfg(feature = "onnx-detector")]
mod onnx;
pub mod yolo;

#[cfg(feature = "onnx-detector")]
pub use onnx::OnnxCardDetector;

use crate::error::Result;
use crate::pdf::PageImage;
use std::path::Path;
use std::sync::Arc;

/// Minimum detector confidence for a page to count as an identity card
pub const ID_CARD_CONFIDENCE: f32 = 0.25;

/// Axis-aligned box in page-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One object-detector hit
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Object detector abstraction (allows stubbing in tests)
pub trait ObjectDetector: Send + Sync {
    /// Detections on `image` scoring above `confidence`
    fn detect(&self, image: &PageImage, confidence: f32) -> Result<Vec<Detection>>;
}

/// Detector used when no model is compiled in; never reports a hit
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDetector;

impl ObjectDetector for DisabledDetector {
    fn detect(&self, _image: &PageImage, _confidence: f32) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Return the first page the detector flags as an identity card.
///
/// Stops at the first flagged page; detector errors propagate.
pub fn find_identity_page(
    detector: &dyn ObjectDetector,
    images: &[PageImage],
) -> Result<Option<u32>> {
    for image in images {
        let detections = detector.detect(image, ID_CARD_CONFIDENCE)?;
        if let Some(best) = detections
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        {
            tracing::debug!(
                page = image.page,
                count = detections.len(),
                confidence = best.confidence,
                "Identity card detected"
            );
            return Ok(Some(image.page));
        }
    }
    Ok(None)
}

/// Load the process-wide identity-card detector.
///
/// A missing or unreadable model is a startup error.
#[cfg(feature = "onnx-detector")]
pub fn load_detector(model_path: &Path, input_size: u32) -> Result<Arc<dyn ObjectDetector>> {
    Ok(Arc::new(OnnxCardDetector::load(model_path, input_size)?))
}

/// Detection compiled out (`--no-default-features`): every page passes
/// through as [`DisabledDetector`].
#[cfg(not(feature = "onnx-detector"))]
pub fn load_detector(model_path: &Path, _input_size: u32) -> Result<Arc<dyn ObjectDetector>> {
    tracing::warn!(
        model = %model_path.display(),
        "Built without onnx-detector feature, identity card detection disabled"
    );
    Ok(Arc::new(DisabledDetector))
}
