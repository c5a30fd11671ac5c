//! OCR text recovery for pages without a usable text layer

mod tesseract;

pub use tesseract::TesseractCli;

use crate::error::Result;
use crate::pdf::PageImage;
use std::sync::Arc;

/// OCR engine abstraction (allows stubbing in tests)
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Recognize the text on one page image
    fn recognize(&self, image: &PageImage) -> Result<String>;
}

/// OCR fallback that never fails.
///
/// The engine is optional: a deployment without OCR installed still
/// classifies, it just recovers no text from scanned pages.
#[derive(Clone, Default)]
pub struct TextRecovery {
    engine: Option<Arc<dyn OcrEngine>>,
}

impl TextRecovery {
    pub fn new(engine: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { engine }
    }

    /// OCR every page and newline-join the results in page order.
    ///
    /// Returns an empty string when no engine is configured or when any
    /// page fails; the failure is logged, not returned.
    pub fn recover(&self, images: &[PageImage]) -> String {
        let Some(engine) = &self.engine else {
            tracing::warn!("OCR engine not available, skipping text recovery");
            return String::new();
        };

        let mut texts = Vec::with_capacity(images.len());
        for image in images {
            match engine.recognize(image) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    tracing::warn!(
                        engine = engine.name(),
                        page = image.page,
                        error = %e,
                        "OCR failed, continuing without recovered text"
                    );
                    return String::new();
                }
            }
        }

        tracing::debug!(
            engine = engine.name(),
            pages = images.len(),
            "Recovered text with OCR"
        );
        texts.join("\n")
    }
}
