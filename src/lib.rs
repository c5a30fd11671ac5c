//! Tax Document Classifier Library
//!
//! Classifies a PDF as one of W2, 1040, 1099INT, 1099DIV, ID_CARD,
//! HANDWRITTEN or OTHER and extracts a best-effort date or year:
//! - text-layer form matching first
//! - then identity-card detection on rendered pages
//! - then OCR text to tell typed from handwritten documents
//!
//! Served over HTTP (`POST /classify`) or as an MCP tool (`classify_document`).

pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod ocr;
pub mod pdf;
pub mod server;
pub mod source;
pub mod vision;

pub use classify::{
    extract_date, match_form, validate_upload, ClassificationResult, Classifier, DateToken,
    DocumentType, FormType, UNKNOWN_YEAR,
};
pub use config::{ServerConfig, Transport};
pub use error::{Error, Result};
pub use http::{router, run_http};
pub use ocr::{OcrEngine, TesseractCli, TextRecovery};
pub use pdf::{DocumentBackend, PageImage, PdfiumBackend, RENDER_DPI};
pub use server::{run_mcp, ClassifierServer, ClassifyDocumentParams, DocumentSource};
pub use vision::{load_detector, Detection, DisabledDetector, ObjectDetector, ID_CARD_CONFIDENCE};
