//! ONNX Runtime identity-card detector

use super::yolo::{decode, preprocess};
use super::{Detection, ObjectDetector};
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use ort::session::Session;
use parking_lot::Mutex;
use std::path::Path;

/// YOLO identity-card model run with ONNX Runtime.
///
/// `Session::run` needs `&mut self`, so the session sits behind a mutex and
/// inference is serialized across requests.
pub struct OnnxCardDetector {
    session: Mutex<Session>,
    input_size: u32,
}

impl OnnxCardDetector {
    /// Load the model once at startup
    pub fn load(model_path: &Path, input_size: u32) -> Result<Self> {
        let model_load = |reason: String| Error::ModelLoad {
            path: model_path.display().to_string(),
            reason,
        };

        if !model_path.exists() {
            return Err(model_load("file not found".to_string()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| model_load(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| model_load(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e: ort::Error| model_load(format!("ONNX load failed: {e}")))?;

        tracing::info!(
            model = %model_path.display(),
            input_size,
            "Identity card detector loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }
}

impl ObjectDetector for OnnxCardDetector {
    fn detect(&self, image: &PageImage, confidence: f32) -> Result<Vec<Detection>> {
        use ort::value::TensorRef;

        let detection_err = |reason: String| Error::Detection { reason };

        let (input, letterbox) = preprocess(image, self.input_size)?;
        let size = self.input_size as usize;
        let array = ndarray::Array4::from_shape_vec((1, 3, size, size), input)
            .map_err(|e| detection_err(e.to_string()))?;
        let tensor =
            TensorRef::from_array_view(&array).map_err(|e| detection_err(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| detection_err(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| detection_err(format!("Output extraction: {e}")))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let detections = decode(&dims, data, confidence, &letterbox)?;
        tracing::debug!(page = image.page, count = detections.len(), "Ran detector");
        Ok(detections)
    }
}
