//! The seam between extraction logic and the PDF engine.
//!
//! [`crate::extract::PageExtractor`] only talks to these traits. The
//! production implementation is [`super::pdfium::PdfiumBackend`]; tests plug
//! in in-memory documents so line reconstruction, scanned-page detection and
//! per-page failure handling can be exercised without the native library.

use crate::error::{FolioError, PageError};
use crate::model::TextItem;
use crate::pipeline::normalize;
use image::DynamicImage;

/// Page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

/// One positioned run of glyphs as the engine reports it.
///
/// `matrix` is the glyph-space transform `[a, b, c, d, e, f]` in PDF
/// user space (origin bottom-left), with the font size already folded into
/// `a..d`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    pub matrix: [f32; 6],
    pub width: f32,
    pub height: f32,
    pub font_name: String,
}

impl GlyphRun {
    /// Effective font size: the magnitude of the transform's first column.
    pub fn font_size(&self) -> f32 {
        let [a, b, ..] = self.matrix;
        (a * a + b * b).sqrt()
    }

    /// Convert into a [`TextItem`] in top-down coordinates.
    ///
    /// Returns `None` when the run holds no visible text.
    pub fn into_text_item(self, page_height: f32) -> Option<TextItem> {
        let text = normalize::clean_run_text(&self.text);
        if text.is_empty() {
            return None;
        }
        let font_size = self.font_size();
        let [.., e, f] = self.matrix;
        Some(TextItem {
            text,
            x: e,
            y: page_height - f,
            width: self.width,
            height: self.height,
            font_name: self.font_name,
            font_size,
        })
    }
}

/// Raw strings from the document information dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoDictionary {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// A PDF engine able to open documents from memory.
///
/// The backend itself crosses threads; the engine state behind an opened
/// document does not. Implementations create that state inside
/// [`PdfBackend::visit_document`], on the calling thread, and drop it before
/// returning.
pub trait PdfBackend: Send + Sync {
    /// Open a document and hand it to `visit` exactly once.
    ///
    /// Failure to open fails the whole import; `visit` is not called then.
    fn visit_document(
        &self,
        bytes: Vec<u8>,
        password: Option<&str>,
        visit: &mut dyn FnMut(&dyn PdfDocumentSource),
    ) -> Result<(), FolioError>;
}

/// Open a document on `backend` and run `f` against it.
pub fn with_document<R>(
    backend: &dyn PdfBackend,
    bytes: Vec<u8>,
    password: Option<&str>,
    f: impl FnOnce(&dyn PdfDocumentSource) -> R,
) -> Result<R, FolioError> {
    let mut f = Some(f);
    let mut out = None;
    backend.visit_document(bytes, password, &mut |document: &dyn PdfDocumentSource| {
        if let Some(f) = f.take() {
            out = Some(f(document));
        }
    })?;
    out.ok_or_else(|| FolioError::Internal("PDF backend never produced the document".into()))
}

/// An opened document. Page indices are 0-based.
///
/// Rasterisation shares one rendering surface per document, so callers
/// must not render two pages of the same document concurrently; taking
/// `&self` from a single thread is how the extractor guarantees that.
pub trait PdfDocumentSource {
    fn page_count(&self) -> usize;

    fn info(&self) -> InfoDictionary;

    fn page_geometry(&self, index: usize) -> Result<PageGeometry, PageError>;

    fn glyph_runs(&self, index: usize) -> Result<Vec<GlyphRun>, PageError>;

    fn rasterize(&self, index: usize, scale: f32) -> Result<DynamicImage, PageError>;
}
