//! Classification cascade
//!
//! Cheapest signal first: the PDF text layer is matched against the form
//! table; if that is inconclusive every page is rasterized and checked for
//! an identity card; otherwise OCR text decides between OTHER and
//! HANDWRITTEN. External failures (unopenable PDF, rasterizer, detector)
//! abort the run. OCR problems never do.

use super::date::{extract_date, DateToken};
use super::forms::match_form;
use super::{ClassificationResult, DocumentType};
use crate::error::{Error, Result};
use crate::ocr::{OcrEngine, TextRecovery};
use crate::pdf::{DocumentBackend, PdfiumBackend, RENDER_DPI};
use crate::vision::{find_identity_page, ObjectDetector};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Cascade stage that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TextLayer,
    VisualIdentity,
    Fallback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::TextLayer => "text_layer",
            Stage::VisualIdentity => "visual_identity",
            Stage::Fallback => "fallback",
        })
    }
}

/// Check an upload before any extraction runs.
///
/// The media-type essence must be `application/pdf` (case-insensitive,
/// parameters ignored) and the body must be non-empty.
pub fn validate_upload(content_type: Option<&str>, data: &[u8]) -> Result<()> {
    let Some(content_type) = content_type else {
        return Err(Error::InvalidUpload {
            reason: "missing content type".to_string(),
        });
    };

    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case(PDF_MEDIA_TYPE) {
        return Err(Error::InvalidUpload {
            reason: format!("content type {}", content_type),
        });
    }

    if data.is_empty() {
        return Err(Error::InvalidUpload {
            reason: "empty body".to_string(),
        });
    }

    Ok(())
}

/// Runs the cascade with injected capabilities.
///
/// Cheap to clone: every capability is shared.
#[derive(Clone)]
pub struct Classifier {
    backend: Arc<dyn DocumentBackend>,
    detector: Arc<dyn ObjectDetector>,
    recovery: TextRecovery,
}

impl Classifier {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        detector: Arc<dyn ObjectDetector>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        Self {
            backend,
            detector,
            recovery: TextRecovery::new(ocr),
        }
    }

    /// Classifier over PDFium
    pub fn with_pdfium(detector: Arc<dyn ObjectDetector>, ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self::new(Arc::new(PdfiumBackend), detector, ocr)
    }

    /// Validate an upload, then classify it. Blocking.
    pub fn classify_upload(
        &self,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<ClassificationResult> {
        validate_upload(content_type, data)?;
        self.classify(data)
    }

    /// Classify one PDF. Blocking: run it off the async runtime.
    pub fn classify(&self, data: &[u8]) -> Result<ClassificationResult> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("classify", %request_id, bytes = data.len());
        let _enter = span.enter();

        let page_texts = self
            .backend
            .page_texts(data)
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to read text layer"))?;
        let pages = page_texts.len();
        let full_text = page_texts.join("\n");
        let full_text = full_text.trim();

        let (stage, result) = self.run_cascade(data, full_text)?;

        tracing::info!(
            %stage,
            pages,
            document_type = %result.document_type,
            year = %result.year,
            "Classified document"
        );
        Ok(result)
    }

    fn run_cascade(&self, data: &[u8], full_text: &str) -> Result<(Stage, ClassificationResult)> {
        if !full_text.is_empty() {
            if let Some(form) = match_form(full_text) {
                let result = ClassificationResult::new(form.into(), extract_date(full_text));
                return Ok((Stage::TextLayer, result));
            }
        }

        let images = self
            .backend
            .rasterize(data, RENDER_DPI)
            .inspect_err(|e| tracing::error!(error = %e, "Failed to rasterize document"))?;

        let flagged = find_identity_page(self.detector.as_ref(), &images)
            .inspect_err(|e| tracing::error!(error = %e, "Identity card detection failed"))?;

        if let Some(page) = flagged {
            tracing::debug!(page, "Page flagged as identity card");
            let ocr_text = self.recovery.recover(&images);
            let text = if ocr_text.trim().is_empty() {
                full_text
            } else {
                ocr_text.as_str()
            };
            let result = ClassificationResult::new(DocumentType::IdCard, extract_date(text));
            return Ok((Stage::VisualIdentity, result));
        }

        let text_source: Cow<'_, str> = if full_text.is_empty() {
            Cow::Owned(self.recovery.recover(&images))
        } else {
            Cow::Borrowed(full_text)
        };

        let result = if text_source.trim().is_empty() {
            ClassificationResult::new(DocumentType::Handwritten, DateToken::Unknown)
        } else {
            ClassificationResult::new(DocumentType::Other, extract_date(&text_source))
        };
        Ok((Stage::Fallback, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PageImage;
    use crate::vision::{BoundingBox, Detection, DisabledDetector};
    use image::RgbImage;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        texts: Vec<String>,
        opened: AtomicUsize,
        rasterized: AtomicUsize,
    }

    impl StubBackend {
        fn new(texts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                texts: texts.iter().map(|t| t.to_string()).collect(),
                opened: AtomicUsize::new(0),
                rasterized: AtomicUsize::new(0),
            })
        }
    }

    impl DocumentBackend for StubBackend {
        fn page_texts(&self, _data: &[u8]) -> Result<Vec<String>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(self.texts.clone())
        }

        fn rasterize(&self, _data: &[u8], dpi: u32) -> Result<Vec<PageImage>> {
            assert_eq!(dpi, RENDER_DPI);
            self.rasterized.fetch_add(1, Ordering::SeqCst);
            Ok((1..=self.texts.len() as u32)
                .map(|p| PageImage::from_rgb(p, RgbImage::new(1, 1)))
                .collect())
        }
    }

    struct Unopenable;

    impl DocumentBackend for Unopenable {
        fn page_texts(&self, _data: &[u8]) -> Result<Vec<String>> {
            Err(Error::Pdfium {
                reason: "bad xref".to_string(),
            })
        }

        fn rasterize(&self, _data: &[u8], _dpi: u32) -> Result<Vec<PageImage>> {
            unreachable!("rasterize after failed open")
        }
    }

    struct FlagAll;

    impl ObjectDetector for FlagAll {
        fn detect(&self, _image: &PageImage, confidence: f32) -> Result<Vec<Detection>> {
            Ok(vec![Detection {
                class_id: 0,
                confidence: confidence + 0.5,
                bbox: BoundingBox { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0 },
            }])
        }
    }

    struct BrokenDetector;

    impl ObjectDetector for BrokenDetector {
        fn detect(&self, _image: &PageImage, _confidence: f32) -> Result<Vec<Detection>> {
            Err(Error::Detection {
                reason: "bad output".to_string(),
            })
        }
    }

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &PageImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn no_detector() -> Arc<dyn ObjectDetector> {
        Arc::new(DisabledDetector)
    }

    fn ocr(text: &'static str) -> Option<Arc<dyn OcrEngine>> {
        Some(Arc::new(FixedOcr(text)))
    }

    fn result(document_type: DocumentType, year: &str) -> ClassificationResult {
        ClassificationResult {
            document_type,
            year: year.to_string(),
        }
    }

    #[rstest]
    #[case(Some("application/pdf"), true)]
    #[case(Some("Application/PDF"), true)]
    #[case(Some("application/pdf; charset=binary"), true)]
    #[case(Some("image/png"), false)]
    #[case(Some("application/pdfx"), false)]
    #[case(None, false)]
    fn test_validate_content_type(#[case] content_type: Option<&str>, #[case] ok: bool) {
        assert_eq!(validate_upload(content_type, b"%PDF-1.7").is_ok(), ok);
    }

    #[test]
    fn test_validate_rejects_empty_body() {
        assert!(matches!(
            validate_upload(Some("application/pdf"), b""),
            Err(Error::InvalidUpload { .. })
        ));
    }

    #[test]
    fn test_rejected_upload_never_reaches_backend() {
        let backend = StubBackend::new(&[""]);
        let classifier = Classifier::new(backend.clone(), Arc::new(FlagAll), None);
        let err = classifier
            .classify_upload(Some("image/png"), b"%PDF-1.7")
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
        assert_eq!(backend.rasterized.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_valid_upload_is_classified() {
        let backend = StubBackend::new(&["Form W-2 Wage and Tax Statement 2023"]);
        let classifier = Classifier::new(backend.clone(), no_detector(), None);
        assert_eq!(
            classifier
                .classify_upload(Some("application/pdf"), b"%PDF-1.7")
                .unwrap(),
            result(DocumentType::W2, "2023")
        );
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_text_layer_match_skips_rasterization() {
        let backend = StubBackend::new(&["Form W-2 Wage and Tax Statement 2023", ""]);
        let classifier = Classifier::new(backend.clone(), Arc::new(FlagAll), None);
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::W2, "2023")
        );
        assert_eq!(backend.rasterized.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_1099_div_with_date() {
        let backend = StubBackend::new(&["Form 1099-DIV Dividends", "Paid 03/15/2023"]);
        let classifier = Classifier::new(backend, no_detector(), None);
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::F1099Div, "03/15/2023")
        );
    }

    #[test]
    fn test_blank_pages_no_detection_no_ocr_is_handwritten() {
        let backend = StubBackend::new(&["", "  \n"]);
        let classifier = Classifier::new(backend.clone(), no_detector(), ocr(""));
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::Handwritten, "UNKNOWN")
        );
        assert_eq!(backend.rasterized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blank_pages_without_ocr_engine_is_handwritten() {
        let classifier = Classifier::new(StubBackend::new(&[""]), no_detector(), None);
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::Handwritten, "UNKNOWN")
        );
    }

    #[test]
    fn test_detected_page_is_id_card_with_ocr_date() {
        let classifier = Classifier::new(
            StubBackend::new(&[""]),
            Arc::new(FlagAll),
            ocr("DOB 04/07/1988"),
        );
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::IdCard, "04/07/1988")
        );
    }

    #[test]
    fn test_id_card_year_falls_back_to_text_layer() {
        // text layer present but no form match; OCR recovers only whitespace
        let classifier = Classifier::new(
            StubBackend::new(&["DRIVER LICENSE exp 2027"]),
            Arc::new(FlagAll),
            ocr(" \n "),
        );
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::IdCard, "2027")
        );
    }

    #[test]
    fn test_id_card_without_any_text() {
        let classifier = Classifier::new(StubBackend::new(&[""]), Arc::new(FlagAll), None);
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::IdCard, "UNKNOWN")
        );
    }

    #[test]
    fn test_unmatched_text_layer_is_other() {
        let classifier = Classifier::new(
            StubBackend::new(&["Quarterly statement", "Period ending 2021"]),
            no_detector(),
            ocr("ignored 1999"),
        );
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::Other, "2021")
        );
    }

    #[test]
    fn test_ocr_text_form_is_still_other() {
        // OCR output is never fed back into the form matcher
        let classifier = Classifier::new(
            StubBackend::new(&[""]),
            no_detector(),
            ocr("Form 1099-INT 2020"),
        );
        assert_eq!(
            classifier.classify(b"%PDF").unwrap(),
            result(DocumentType::Other, "2020")
        );
    }

    #[test]
    fn test_unopenable_document_propagates() {
        let classifier = Classifier::new(Arc::new(Unopenable), no_detector(), None);
        let err = classifier.classify(b"%PDF").unwrap_err();
        assert!(matches!(err, Error::Pdfium { .. }));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_detector_failure_propagates() {
        let classifier = Classifier::new(StubBackend::new(&[""]), Arc::new(BrokenDetector), ocr("x"));
        assert!(matches!(
            classifier.classify(b"%PDF"),
            Err(Error::Detection { .. })
        ));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::VisualIdentity.to_string(), "visual_identity");
    }
}
