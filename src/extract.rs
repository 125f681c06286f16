//! PageExtractor: PDF bytes → [`ImportResult`].
//!
//! ## Failure containment
//!
//! Two failure tiers, mirroring [`FolioError`] vs [`PageError`]:
//!
//! - The document cannot be opened (bad signature, corrupt stream, wrong or
//!   missing password): the result has `success = false`, zero pages and the
//!   error message.
//! - A single page fails (geometry, text, raster or encode): the page is
//!   left out of `pages`, a warning naming it is recorded, and the import
//!   carries on.
//!
//! ## Threading
//!
//! All engine calls run inside one `spawn_blocking` task, pages strictly in
//! order. The engine's raster surface is per document and must not be used
//! for two pages at once.

use crate::config::ImportOptions;
use crate::error::{FolioError, PageError};
use crate::model::{DocumentMetadata, ExtractedPage, ImportResult, Orientation, TextItem};
use crate::pipeline::backend::{with_document, PdfBackend, PdfDocumentSource};
use crate::pipeline::pdfium::PdfiumBackend;
use crate::pipeline::{encode, input, lines, metadata};
use crate::progress::{ImportProgress, ImportProgressCallback, NoopImportProgress};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Below this many characters a page is treated as scanned.
///
/// Heuristic; tunable.
pub const SCANNED_MIN_CHARS: usize = 50;

/// Below this many characters per square point a page is treated as scanned.
///
/// Heuristic; tunable.
pub const SCANNED_MIN_DENSITY: f32 = 1e-4;

/// Whether a page with this many extracted characters and this size looks
/// image-only.
///
/// `chars` counts the characters of the glyph runs themselves, not the
/// separators added when lines are rebuilt.
pub fn is_scanned_page(chars: usize, width: f32, height: f32) -> bool {
    let area = width * height;
    if chars < SCANNED_MIN_CHARS || area <= 0.0 {
        return true;
    }
    (chars as f32 / area) < SCANNED_MIN_DENSITY
}

/// Extracts pages from PDF documents through a [`PdfBackend`].
#[derive(Clone)]
pub struct PageExtractor {
    backend: Arc<dyn PdfBackend>,
    progress: Option<ImportProgress>,
}

impl PageExtractor {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            progress: None,
        }
    }

    /// Extractor backed by the system pdfium library.
    pub fn pdfium() -> Result<Self, FolioError> {
        Ok(Self::new(Arc::new(PdfiumBackend::bind()?)))
    }

    pub fn with_progress(mut self, progress: ImportProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Import a PDF held in memory.
    ///
    /// Never fails: document-level problems come back as `success = false`.
    pub async fn import_pdf(&self, bytes: Vec<u8>, options: &ImportOptions) -> ImportResult {
        let backend = Arc::clone(&self.backend);
        let progress = self.progress.clone();
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            let noop = NoopImportProgress;
            let cb: &dyn ImportProgressCallback = match progress.as_deref() {
                Some(cb) => cb,
                None => &noop,
            };
            import_blocking(backend.as_ref(), bytes, &options, cb)
        })
        .await
        .unwrap_or_else(|e| ImportResult::failed(format!("Extraction task failed: {}", e)))
    }

    /// Read the information dictionary without extracting any page.
    pub async fn inspect(
        &self,
        bytes: Vec<u8>,
        password: Option<String>,
    ) -> Result<DocumentMetadata, FolioError> {
        input::check_magic(&bytes)?;
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || -> Result<DocumentMetadata, FolioError> {
            with_document(backend.as_ref(), bytes, password.as_deref(), |document| {
                metadata::from_info(document.info(), document.page_count())
            })
        })
        .await
        .map_err(|e| FolioError::Internal(format!("Inspection task failed: {}", e)))?
    }

    /// Read and import a PDF from disk.
    ///
    /// File-system problems (missing file, no permission, not a PDF) are
    /// returned as errors before the engine is involved.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        options: &ImportOptions,
    ) -> Result<ImportResult, FolioError> {
        let bytes = input::read_pdf_file(path.as_ref()).await?;
        Ok(self.import_pdf(bytes, options).await)
    }
}

/// Synchronous wrapper around [`PageExtractor::import_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn import_pdf_sync(
    extractor: &PageExtractor,
    bytes: Vec<u8>,
    options: &ImportOptions,
) -> Result<ImportResult, FolioError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| FolioError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extractor.import_pdf(bytes, options)))
}

fn import_blocking(
    backend: &dyn PdfBackend,
    bytes: Vec<u8>,
    options: &ImportOptions,
    cb: &dyn ImportProgressCallback,
) -> ImportResult {
    let start = Instant::now();

    if let Err(e) = input::check_magic(&bytes) {
        warn!("Import rejected: {}", e);
        return ImportResult::failed(e.to_string());
    }

    let imported = with_document(backend, bytes, options.password.as_deref(), |document| {
        import_document(document, options, cb)
    });
    match imported {
        Ok(result) => {
            info!(
                "Import complete: {}/{} pages in {}ms",
                result.pages.len(),
                result.total_pages,
                start.elapsed().as_millis()
            );
            result
        }
        Err(e) => {
            warn!("Could not open PDF: {}", e);
            ImportResult::failed(e.to_string())
        }
    }
}

fn import_document(
    document: &dyn PdfDocumentSource,
    options: &ImportOptions,
    cb: &dyn ImportProgressCallback,
) -> ImportResult {
    let total_pages = document.page_count();
    let metadata = metadata::from_info(document.info(), total_pages);
    let indices = options.page_indices(total_pages);
    info!(
        "Importing {} of {} pages (text: {}, images: {})",
        indices.len(),
        total_pages,
        options.extract_text,
        options.render_as_images
    );
    cb.on_import_start(indices.len());

    let mut pages = Vec::with_capacity(indices.len());
    let mut warnings = Vec::new();

    for &idx in &indices {
        match extract_page(document, idx, options) {
            Ok(page) => {
                debug!(
                    "Page {}: {} items, {} chars, scanned={}",
                    page.page_number,
                    page.text_items.len(),
                    page.text_content.len(),
                    page.is_scanned
                );
                cb.on_page_extracted(page.page_number, indices.len(), page.text_content.chars().count());
                pages.push(page);
            }
            Err(e) => {
                warn!("{}", e);
                cb.on_page_error(e.page(), indices.len(), &e.to_string());
                warnings.push(e.to_string());
            }
        }
    }

    cb.on_import_complete(indices.len(), pages.len());

    ImportResult {
        success: true,
        total_pages,
        pages,
        metadata: Some(metadata),
        error: None,
        warnings,
    }
}

fn extract_page(
    document: &dyn PdfDocumentSource,
    idx: usize,
    options: &ImportOptions,
) -> Result<ExtractedPage, PageError> {
    let page_number = idx + 1;
    let geometry = document.page_geometry(idx)?;
    if !geometry.width.is_finite() || !geometry.height.is_finite() {
        return Err(PageError::GeometryFailed {
            page: page_number,
            detail: format!("{}x{}", geometry.width, geometry.height),
        });
    }

    let (text_items, text_content) = if options.extract_text {
        let items: Vec<TextItem> = document
            .glyph_runs(idx)?
            .into_iter()
            .filter_map(|run| run.into_text_item(geometry.height))
            .collect();
        let text = lines::reconstruct_text(&items);
        (items, text)
    } else {
        (Vec::new(), String::new())
    };

    let char_count: usize = text_items.iter().map(|item| item.text.chars().count()).sum();
    // Without text there is nothing to judge the page by.
    let is_scanned =
        options.extract_text && is_scanned_page(char_count, geometry.width, geometry.height);

    let image_data_url = if options.render_as_images || (is_scanned && !options.use_ocr) {
        let image = document.rasterize(idx, options.image_scale)?;
        let url = encode::to_data_url(&image).map_err(|e| PageError::EncodeFailed {
            page: page_number,
            detail: e.to_string(),
        })?;
        Some(url)
    } else {
        None
    };

    Ok(ExtractedPage {
        page_number,
        width: geometry.width,
        height: geometry.height,
        orientation: Orientation::from_dimensions(geometry.width, geometry.height),
        text_content,
        text_items,
        image_data_url,
        is_scanned,
    })
}
