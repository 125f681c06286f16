//! pdfium-render implementation of the PDF backend.
//!
//! ## Binding
//!
//! pdfium is a native library loaded at runtime. [`PdfiumBackend::bind`]
//! looks for it in `PDFIUM_LIB_PATH` (a directory), then next to the
//! working directory, then in the system library path.
//!
//! ## Threading
//!
//! pdfium bindings are not `Send`. [`PdfiumBackend`] therefore holds only
//! the library location and binds inside
//! [`PdfBackend::visit_document`], which the extractor calls from
//! `spawn_blocking`, one page at a time.

use crate::error::{FolioError, PageError};
use crate::pipeline::backend::{GlyphRun, InfoDictionary, PageGeometry, PdfBackend, PdfDocumentSource};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Where the pdfium shared library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PdfiumLibrary {
    Dir(String),
    System,
}

/// PDF backend driven by a pdfium library resolved at construction.
///
/// Only the library location is kept; each document gets its own
/// [`Pdfium`] instance, created and dropped on the thread that opens it.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    library: PdfiumLibrary,
}

impl PdfiumBackend {
    /// Locate pdfium, trying `PDFIUM_LIB_PATH`, `./`, then the system library.
    pub fn bind() -> Result<Self, FolioError> {
        let mut candidates: Vec<String> = Vec::new();
        if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
            if !dir.is_empty() {
                candidates.push(dir);
            }
        }
        candidates.push("./".to_string());

        let mut last_err = String::from("no candidate paths");
        for dir in candidates {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
                Ok(_) => {
                    info!("Found pdfium in {}", dir);
                    return Ok(Self {
                        library: PdfiumLibrary::Dir(dir),
                    });
                }
                Err(e) => {
                    debug!("pdfium not found in {}: {}", dir, e);
                    last_err = e.to_string();
                }
            }
        }

        Pdfium::bind_to_system_library()
            .map(|_| Self {
                library: PdfiumLibrary::System,
            })
            .map_err(|e| FolioError::PdfiumBindingFailed(format!("{} (last tried: {})", e, last_err)))
    }

    /// Use the pdfium library in `dir` without probing it first.
    pub fn from_library_dir(dir: impl Into<String>) -> Self {
        Self {
            library: PdfiumLibrary::Dir(dir.into()),
        }
    }

    fn load(&self) -> Result<Pdfium, FolioError> {
        let bindings = match &self.library {
            PdfiumLibrary::Dir(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            PdfiumLibrary::System => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| FolioError::PdfiumBindingFailed(e.to_string()))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn visit_document(
        &self,
        bytes: Vec<u8>,
        password: Option<&str>,
        visit: &mut dyn FnMut(&dyn PdfDocumentSource),
    ) -> Result<(), FolioError> {
        let pdfium = self.load()?;
        let document = pdfium
            .load_pdf_from_byte_vec(bytes, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        FolioError::WrongPassword
                    } else {
                        FolioError::PasswordRequired
                    }
                } else {
                    FolioError::CorruptPdf { detail: err_str }
                }
            })?;

        info!("PDF loaded: {} pages", document.pages().len());
        visit(&PdfiumDocument { document });
        Ok(())
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, index: usize) -> Result<PdfPage<'a>, PageError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| PageError::PageNotFound {
                page: index + 1,
                detail: format!("{:?}", e),
            })
    }
}

impl PdfDocumentSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn info(&self) -> InfoDictionary {
        let metadata = self.document.metadata();
        let get = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata
                .get(tag)
                .map(|t| t.value().to_string())
                .filter(|v| !v.is_empty())
        };

        InfoDictionary {
            title: get(PdfDocumentMetadataTagType::Title),
            author: get(PdfDocumentMetadataTagType::Author),
            subject: get(PdfDocumentMetadataTagType::Subject),
            keywords: get(PdfDocumentMetadataTagType::Keywords),
            creator: get(PdfDocumentMetadataTagType::Creator),
            producer: get(PdfDocumentMetadataTagType::Producer),
            creation_date: get(PdfDocumentMetadataTagType::CreationDate),
            modification_date: get(PdfDocumentMetadataTagType::ModificationDate),
        }
    }

    fn page_geometry(&self, index: usize) -> Result<PageGeometry, PageError> {
        let page = self.page(index)?;
        Ok(PageGeometry {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn glyph_runs(&self, index: usize) -> Result<Vec<GlyphRun>, PageError> {
        let page = self.page(index)?;
        let text_failed = |e: PdfiumError| PageError::TextFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };

        let mut runs = Vec::new();
        for object in page.objects().iter() {
            let Some(text_object) = object.as_text_object() else {
                continue;
            };

            let matrix = text_object.matrix().map_err(text_failed)?;
            // Object matrices are in unscaled text space; fold the font size in
            // so the run's transform describes the rendered glyph size.
            let size = text_object.unscaled_font_size().value;
            runs.push(GlyphRun {
                text: text_object.text(),
                matrix: [
                    matrix.a() * size,
                    matrix.b() * size,
                    matrix.c() * size,
                    matrix.d() * size,
                    matrix.e(),
                    matrix.f(),
                ],
                width: object.width().map_err(text_failed)?.value,
                height: object.height().map_err(text_failed)?.value,
                font_name: text_object.font().name(),
            });
        }

        debug!("Page {}: {} text objects", index + 1, runs.len());
        Ok(runs)
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<DynamicImage, PageError> {
        let page = self.page(index)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PageError::RasterFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
