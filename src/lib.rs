//! # folio-pipeline
//!
//! Import PDFs into editable pages ("folios") and export folios back to PDF,
//! resolving the placeholders ("slots") embedded in their content.
//!
//! ## Why this crate?
//!
//! Glyph-level PDF extraction has no notion of lines, and image-only pages
//! carry no text at all. The import side rebuilds readable text from
//! positioned glyph runs and flags scanned pages so they can be embedded as
//! images instead. The export side turns typed slots (page numbers, dates,
//! data-source fields, user overrides) into final strings with strict
//! precedence and per-slot failure isolation, then drives a render backend
//! with retries, cancellation and progress reporting.
//!
//! ## Pipeline Overview
//!
//! ```text
//! import:  PDF bytes ─▶ PageExtractor ─▶ ExtractedPage[] ─▶ create_folios ─▶ Folio[]
//!                       (pdfium, spawn_blocking)
//!
//! export:  Folio[] ─▶ SlotResolver.resolve_all ─▶ FolioSerializer ─▶ RenderBackend ─▶ PDF
//!                     (concurrent, deduped fetches)                  (retry, cancel)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio_pipeline::{
//!     create_folios, ExportConfig, ExportOptions, FolioOptions, ImportOptions,
//!     NoopExportProgress, PageExtractor, PdfExportService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = PageExtractor::pdfium()?;
//!     let imported = extractor
//!         .import_file("contract.pdf", &ImportOptions::default())
//!         .await?;
//!     let folios = create_folios(&imported.pages, &FolioOptions::default());
//!
//!     let service = PdfExportService::new(ExportConfig::default())?;
//!     let options = ExportOptions::builder().title("Contract").build()?;
//!     let outcome = service.export(&folios, &options, &NoopExportProgress).await?;
//!     outcome.write_to(&outcome.filename).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `folio` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! folio-pipeline = { version = "0.1", default-features = false }
//! ```
//!
//! ## Native library
//!
//! pdfium is loaded at runtime from `PDFIUM_LIB_PATH`, the working
//! directory, or the system library path. Everything except
//! [`PageExtractor::pdfium`] works without it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod folio;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod slots;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExportConfig, ExportConfigBuilder, ExportMetadata, ExportOptions, ExportOptionsBuilder,
    FolioOptions, ImportOptions, ImportOptionsBuilder, PageRange, ScannedPageMode,
};
pub use error::{FolioError, PageError, SlotError};
pub use export::{CancelToken, ExportOutcome, PdfExportService};
pub use extract::{import_pdf_sync, is_scanned_page, PageExtractor};
pub use folio::{create_folios, folio_summary, folios_to_html};
pub use model::{
    Block, DocumentMetadata, ExtractedPage, Folio, FolioSummary, ImportResult, Orientation, Slot,
    SlotMetadata, SlotType, TextItem,
};
pub use progress::{
    ExportProgress, ExportProgressSink, ExportStatus, ImportProgress, ImportProgressCallback,
    NoopExportProgress, NoopImportProgress,
};
pub use slots::{DataSource, ResolutionContext, ResolutionResult, SlotResolver, SourceKind};
