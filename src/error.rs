//! Error types for the tax document classifier

use thiserror::Error;

/// Result type alias for the tax document classifier
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tax document classifier
#[derive(Error, Debug)]
pub enum Error {
    /// Upload missing, not a PDF, or empty
    #[error("Invalid upload: {reason}")]
    InvalidUpload { reason: String },

    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected
    #[error("PDF is password protected")]
    PasswordRequired,

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Page image could not be encoded or decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// OCR engine binary is not installed or not runnable
    #[error("OCR engine unavailable: {command}")]
    OcrUnavailable { command: String },

    /// OCR engine ran but failed
    #[error("OCR failed: {reason}")]
    Ocr { reason: String },

    /// Detection model could not be loaded
    #[error("Failed to load detection model {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    /// Object detection failed
    #[error("Detection failed: {reason}")]
    Detection { reason: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// Invalid configuration value
    #[error("Invalid configuration {key}: {reason}")]
    Config { key: String, reason: String },

    /// Blocking classification task panicked or was cancelled
    #[error("Classification task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidUpload { .. } => "A PDF file is required.".to_string(),
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::Pdfium { .. } | Error::Image(_) => "PDF processing error".to_string(),
            Error::OcrUnavailable { .. } | Error::Ocr { .. } => "OCR error".to_string(),
            Error::ModelLoad { .. } | Error::Detection { .. } => {
                "Identity card detection failed".to_string()
            }
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::Config { key, .. } => format!("Invalid configuration: {}", key),
            Error::TaskJoin(_) => "Internal error".to_string(),
        }
    }

    /// Whether the error was caused by the caller's input rather than
    /// by the service or one of its external capabilities.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidUpload { .. })
    }
}
