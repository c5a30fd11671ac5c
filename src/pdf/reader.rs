//! Text-layer extraction with PDFium

use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Bind PDFium (creates a new instance each time - PDFium is not thread-safe).
///
/// Discovery order: `PDFIUM_DYNAMIC_LIB_PATH`, the working directory,
/// `/opt/pdfium/lib`, then the system library path.
pub(crate) fn create_pdfium() -> Result<Pdfium> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| Error::Pdfium {
            reason: format!("Failed to load PDFium from {}: {}", path, e),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Reject anything without a `%PDF` header before handing it to PDFium
pub(crate) fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Map PDFium load errors to our error type
pub(crate) fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

/// Text layer of one submitted PDF
pub struct PdfReader {
    page_texts: Vec<String>,
}

impl PdfReader {
    /// Open a PDF from bytes and extract the text layer of every page.
    ///
    /// A document PDFium cannot open is an error. A single page whose text
    /// cannot be read contributes an empty string instead.
    pub fn open_bytes(data: &[u8]) -> Result<Self> {
        check_pdf_header(data)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(map_pdfium_error)?;

        let page_texts = Self::extract_all_page_texts(&document);

        Ok(Self { page_texts })
    }

    fn extract_all_page_texts(document: &PdfDocument) -> Vec<String> {
        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);

        for index in 0..pages.len() {
            let text = pages
                .get(index)
                .and_then(|page| {
                    let text = page.text()?.all();
                    Ok(text)
                })
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        page = index + 1,
                        error = %e,
                        "Failed to read page text, treating it as empty"
                    );
                    String::new()
                });
            texts.push(text);
        }

        texts
    }

    /// Number of pages in the document
    pub fn page_count(&self) -> usize {
        self.page_texts.len()
    }

    /// Consume the reader, returning the per-page text
    pub fn into_page_texts(self) -> Vec<String> {
        self.page_texts
    }
}
