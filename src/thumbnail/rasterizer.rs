//! Page rasterization seam
//!
//! Rasterization is CPU-bound and backend-specific, so it sits behind a sync
//! trait that the cache drives from a blocking thread. The MuPDF backend is
//! optional; tests substitute counting stubs.

use crate::error::Result;

/// Renders the first page of a standalone PDF to a compressed JPEG.
pub trait PageRasterizer: Send + Sync {
    /// `quality` is the JPEG quality (1-100); `max_size` bounds the longest
    /// edge of the output in pixels. Failures surface as
    /// [`crate::Error::Render`] and are never cached.
    fn rasterize(&self, pdf_bytes: &[u8], quality: u8, max_size: u32) -> Result<Vec<u8>>;
}

/// MuPDF-backed rasterizer (feature `render-mupdf`).
#[cfg(feature = "render-mupdf")]
pub struct MupdfRasterizer;

#[cfg(feature = "render-mupdf")]
impl PageRasterizer for MupdfRasterizer {
    fn rasterize(&self, pdf_bytes: &[u8], quality: u8, max_size: u32) -> Result<Vec<u8>> {
        use crate::error::Error;
        use mupdf::{Colorspace, Document as MupdfDocument, Matrix};

        let doc = MupdfDocument::from_bytes(pdf_bytes, "application/pdf")
            .map_err(|e| Error::Render(format!("failed to open page PDF: {}", e)))?;
        let page = doc
            .load_page(0)
            .map_err(|e| Error::Render(format!("failed to load page: {}", e)))?;
        let bounds = page
            .bounds()
            .map_err(|e| Error::Render(format!("failed to measure page: {}", e)))?;

        // Scale so the longest edge fits max_size.
        let width = bounds.x1 - bounds.x0;
        let height = bounds.y1 - bounds.y0;
        let scale = (max_size as f32) / width.max(height).max(1.0);

        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&matrix, &colorspace, false, false)
            .map_err(|e| Error::Render(format!("failed to rasterize page: {}", e)))?;

        encode_jpeg(&pixmap, quality)
    }
}

#[cfg(feature = "render-mupdf")]
fn encode_jpeg(pixmap: &mupdf::Pixmap, quality: u8) -> Result<Vec<u8>> {
    use crate::error::Error;

    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    // Repack to tight RGB regardless of the pixmap's component count.
    let mut rgb_buffer = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            rgb_buffer.extend_from_slice(&[r, g, b]);
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| Error::Render("failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| Error::Render(format!("JPEG encoding failed: {}", e)))?;

    Ok(output)
}
