//! PDF processing layer
//!
//! Text-layer extraction and page rasterization using PDFium, behind the
//! [`DocumentBackend`] seam the classifier depends on.

mod reader;
mod render;

pub(crate) use reader::check_pdf_header;
pub use reader::PdfReader;
pub use render::{render_pages, PageImage, RENDER_DPI};

use crate::error::Result;

/// Text-layer decoder and rasterizer for submitted documents
pub trait DocumentBackend: Send + Sync {
    /// Per-page text in page order. Pages without a readable text layer
    /// yield empty strings; a document that cannot be opened is an error.
    fn page_texts(&self, data: &[u8]) -> Result<Vec<String>>;

    /// Render every page at `dpi`, in page order.
    fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<PageImage>>;
}

/// [`DocumentBackend`] backed by the PDFium shared library.
///
/// Stateless: PDFium is bound per call because its handle is not thread-safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumBackend;

impl DocumentBackend for PdfiumBackend {
    fn page_texts(&self, data: &[u8]) -> Result<Vec<String>> {
        let reader = PdfReader::open_bytes(data)?;
        tracing::debug!(pages = reader.page_count(), "Read text layer");
        Ok(reader.into_page_texts())
    }

    fn rasterize(&self, data: &[u8], dpi: u32) -> Result<Vec<PageImage>> {
        render_pages(data, dpi)
    }
}
