//! Page rasterization with PDFium

use super::reader::{check_pdf_header, create_pdfium, map_pdfium_error};
use crate::error::{Error, Result};
use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use std::io::Cursor;

/// Resolution pages are rendered at for detection and OCR
pub const RENDER_DPI: u32 = 300;

/// PDF points per inch
const POINTS_PER_INCH: f32 = 72.0;

/// One rasterized page: RGB8 samples, row-major, no padding
#[derive(Clone)]
pub struct PageImage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Raw RGB samples, `width * height * 3` bytes
    pub samples: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page", &self.page)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.samples.len())
            .finish()
    }
}

impl PageImage {
    pub fn from_rgb(page: u32, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            page,
            width,
            height,
            samples: image.into_raw(),
        }
    }

    /// Copy the samples into an `image` buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.samples.clone()).ok_or_else(|| {
            Error::Pdfium {
                reason: format!(
                    "Page {} sample buffer is {} bytes, expected {}x{}x3",
                    self.page,
                    self.samples.len(),
                    self.width,
                    self.height
                ),
            }
        })
    }

    /// Encode as PNG
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let image = DynamicImage::ImageRgb8(self.to_rgb_image()?);
        let mut png_bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)?;
        Ok(png_bytes)
    }
}

/// Render every page of a PDF at `dpi`.
///
/// Any page that fails to render fails the whole call.
pub fn render_pages(data: &[u8], dpi: u32) -> Result<Vec<PageImage>> {
    check_pdf_header(data)?;

    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error)?;

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
        .render_form_data(true)
        .render_annotations(true);

    let pages = document.pages();
    let mut rendered = Vec::with_capacity(pages.len() as usize);

    for index in 0..pages.len() {
        let page_num = index as u32 + 1;
        let page = pages.get(index).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_num, e),
        })?;

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to render page {}: {}", page_num, e),
            })?;

        let image = PageImage::from_rgb(page_num, bitmap.as_image().to_rgb8());

        tracing::debug!(
            page = page_num,
            width = image.width,
            height = image.height,
            dpi,
            "Rendered PDF page"
        );

        rendered.push(image);
    }

    Ok(rendered)
}
