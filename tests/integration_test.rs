//! Integration tests for the tax document classifier
//!
//! PDFium, Tesseract and the detection model are replaced by in-process
//! stand-ins so the full cascade runs anywhere.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use image::RgbImage;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taxdoc_classifier::vision::BoundingBox;
use taxdoc_classifier::{
    extract_date, router, ClassificationResult, Classifier, DateToken, Detection, DisabledDetector,
    DocumentBackend, DocumentType, Error, ObjectDetector, OcrEngine, PageImage, Result,
};
use tower::ServiceExt;

/// A "document" is a list of page texts; blank pages are scans
struct Pages {
    texts: Vec<&'static str>,
    opened: AtomicUsize,
    rasterized: AtomicUsize,
}

impl Pages {
    fn new(texts: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            texts: texts.to_vec(),
            opened: AtomicUsize::new(0),
            rasterized: AtomicUsize::new(0),
        })
    }
}

impl DocumentBackend for Pages {
    fn page_texts(&self, _data: &[u8]) -> Result<Vec<String>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.texts.iter().map(|t| t.to_string()).collect())
    }

    fn rasterize(&self, _data: &[u8], _dpi: u32) -> Result<Vec<PageImage>> {
        self.rasterized.fetch_add(1, Ordering::SeqCst);
        Ok((1..=self.texts.len() as u32)
            .map(|page| PageImage::from_rgb(page, RgbImage::new(8, 8)))
            .collect())
    }
}

/// Flags one page as an identity card
struct CardOnPage(u32);

impl ObjectDetector for CardOnPage {
    fn detect(&self, image: &PageImage, _confidence: f32) -> Result<Vec<Detection>> {
        if image.page != self.0 {
            return Ok(Vec::new());
        }
        Ok(vec![Detection {
            class_id: 0,
            confidence: 0.87,
            bbox: BoundingBox {
                x1: 1.0,
                y1: 1.0,
                x2: 6.0,
                y2: 4.0,
            },
        }])
    }
}

/// Returns a fixed transcription per page
struct Transcript(Vec<&'static str>);

impl OcrEngine for Transcript {
    fn name(&self) -> &str {
        "transcript"
    }

    fn recognize(&self, image: &PageImage) -> Result<String> {
        Ok(self
            .0
            .get(image.page as usize - 1)
            .copied()
            .unwrap_or_default()
            .to_string())
    }
}

struct MissingBinary;

impl OcrEngine for MissingBinary {
    fn name(&self) -> &str {
        "missing"
    }

    fn recognize(&self, _image: &PageImage) -> Result<String> {
        Err(Error::OcrUnavailable {
            command: "tesseract".to_string(),
        })
    }
}

fn classify(
    backend: Arc<Pages>,
    detector: Arc<dyn ObjectDetector>,
    ocr: Option<Arc<dyn OcrEngine>>,
) -> ClassificationResult {
    Classifier::new(backend, detector, ocr)
        .classify(b"%PDF-1.7")
        .expect("classification should succeed")
}

fn expected(document_type: DocumentType, year: &str) -> ClassificationResult {
    ClassificationResult {
        document_type,
        year: year.to_string(),
    }
}

#[rstest]
#[case(&["Form W-2 Wage and Tax Statement 2023"], DocumentType::W2, "2023")]
#[case(&["Form 1099-DIV Dividends", "Date paid 03/15/2023"], DocumentType::F1099Div, "03/15/2023")]
#[case(&["FORM 1099-INT", "Interest Income (see Form 1040)"], DocumentType::F1099Int, "UNKNOWN")]
#[case(&["Form 1040 U.S. Individual Income Tax Return 2022"], DocumentType::F1040, "2022")]
#[case(&["Form 1040 U.S. Individual Income Tax Return", "Form W-2 Wage and Tax Statement 2021"], DocumentType::W2, "2021")]
fn test_text_layer_forms(
    #[case] pages: &[&'static str],
    #[case] document_type: DocumentType,
    #[case] year: &str,
) {
    let backend = Pages::new(pages);
    let result = classify(backend.clone(), Arc::new(CardOnPage(1)), None);
    assert_eq!(result, expected(document_type, year));
    assert_eq!(backend.rasterized.load(Ordering::SeqCst), 0);
}

#[test]
fn test_scanned_card_on_second_page() {
    let result = classify(
        Pages::new(&["", ""]),
        Arc::new(CardOnPage(2)),
        Some(Arc::new(Transcript(vec!["", "DOB 11-02-1990 EXP 2030"]))),
    );
    assert_eq!(result, expected(DocumentType::IdCard, "11-02-1990"));
}

#[test]
fn test_blank_scan_is_handwritten() {
    let backend = Pages::new(&["", "", ""]);
    let result = classify(
        backend.clone(),
        Arc::new(DisabledDetector),
        Some(Arc::new(Transcript(vec![]))),
    );
    assert_eq!(result, expected(DocumentType::Handwritten, "UNKNOWN"));
    assert_eq!(backend.rasterized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unavailable_ocr_degrades_to_handwritten() {
    let result = classify(
        Pages::new(&[""]),
        Arc::new(DisabledDetector),
        Some(Arc::new(MissingBinary)),
    );
    assert_eq!(result, expected(DocumentType::Handwritten, "UNKNOWN"));
}

#[test]
fn test_typed_letter_is_other() {
    let result = classify(
        Pages::new(&[""]),
        Arc::new(DisabledDetector),
        Some(Arc::new(Transcript(vec!["Dear taxpayer, your refund for 2019 ..."]))),
    );
    assert_eq!(result, expected(DocumentType::Other, "2019"));
}

#[test]
fn test_date_extraction_is_idempotent() {
    for text in ["", "no dates", "Filed 4/15/24 for 2023", "year 1987"] {
        let first = extract_date(text);
        assert!(!first.as_str().is_empty());
        assert_eq!(extract_date(first.as_str()), first);
    }
    assert_eq!(extract_date("4/15/24"), DateToken::Date("4/15/24"));
}

fn upload(content_type: &str, data: &[u8]) -> Request<Body> {
    let boundary = "integration-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/classify")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_http_id_card_upload() {
    let classifier = Classifier::new(
        Pages::new(&[""]),
        Arc::new(CardOnPage(1)),
        Some(Arc::new(Transcript(vec!["ISS 2018"]))),
    );
    let app = router(classifier, 1024 * 1024);

    let response = app
        .oneshot(upload("application/pdf", b"%PDF-1.4 scanned"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json, serde_json::json!({"document_type": "ID_CARD", "year": "2018"}));
}

#[tokio::test]
async fn test_http_rejects_before_extraction() {
    let backend = Pages::new(&[""]);
    let app = router(
        Classifier::new(backend.clone(), Arc::new(DisabledDetector), None),
        1024 * 1024,
    );

    let response = app.oneshot(upload("image/png", b"\x89PNG")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
    assert_eq!(backend.rasterized.load(Ordering::SeqCst), 0);
}
