//! Configuration types for import and export.
//!
//! Import behaviour is controlled through [`ImportOptions`], export through
//! a service-level [`ExportConfig`] (where the backend lives, how hard to
//! retry) plus per-call [`ExportOptions`] (what to export). Each is built
//! via a builder that validates on `build()`; defaults are documented on the
//! fields.

use crate::error::FolioError;
use crate::slots::DataSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ── Page ranges ──────────────────────────────────────────────────────────

/// Inclusive `start..=end` range.
///
/// 1-indexed page numbers when used for import; folio `index` bounds when
/// used for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Expand into sorted, contiguous 0-indexed page indices, clipped to the document.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let s = self.start.max(1) - 1;
        let e = self.end.min(total_pages);
        (s..e).collect()
    }

    /// Whether `value` lies within the inclusive bounds.
    pub fn contains(&self, value: usize) -> bool {
        value >= self.start && value <= self.end
    }
}

// ── Import ───────────────────────────────────────────────────────────────

/// Options for [`crate::extract::PageExtractor::import_pdf`].
///
/// # Example
/// ```rust
/// use folio_pipeline::{ImportOptions, PageRange};
///
/// let options = ImportOptions::builder()
///     .page_range(PageRange::new(1, 3))
///     .render_as_images(true)
///     .image_scale(2.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Pull positioned text runs from every page. Default: true.
    pub extract_text: bool,

    /// Rasterise every page, not only scanned ones. Default: false.
    pub render_as_images: bool,

    /// Raster scale relative to the page's point size. Range 0.1–8.0. Default: 1.5.
    pub image_scale: f32,

    /// Restrict the import to a 1-indexed inclusive range. Default: all pages.
    pub page_range: Option<PageRange>,

    /// Scanned pages will be handed to OCR downstream, so skip rasterising them. Default: false.
    pub use_ocr: bool,

    /// User password for encrypted documents.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            extract_text: true,
            render_as_images: false,
            image_scale: 1.5,
            page_range: None,
            use_ocr: false,
            password: None,
        }
    }
}

impl ImportOptions {
    pub fn builder() -> ImportOptionsBuilder {
        ImportOptionsBuilder {
            options: Self::default(),
        }
    }

    /// 0-indexed pages selected for a document with `total_pages` pages.
    pub fn page_indices(&self, total_pages: usize) -> Vec<usize> {
        match self.page_range {
            Some(range) => range.to_indices(total_pages),
            None => (0..total_pages).collect(),
        }
    }
}

/// Builder for [`ImportOptions`].
#[derive(Debug)]
pub struct ImportOptionsBuilder {
    options: ImportOptions,
}

impl ImportOptionsBuilder {
    pub fn extract_text(mut self, v: bool) -> Self {
        self.options.extract_text = v;
        self
    }

    pub fn render_as_images(mut self, v: bool) -> Self {
        self.options.render_as_images = v;
        self
    }

    pub fn image_scale(mut self, scale: f32) -> Self {
        self.options.image_scale = scale.clamp(0.1, 8.0);
        self
    }

    pub fn page_range(mut self, range: PageRange) -> Self {
        self.options.page_range = Some(range);
        self
    }

    pub fn use_ocr(mut self, v: bool) -> Self {
        self.options.use_ocr = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.options.password = Some(pwd.into());
        self
    }

    pub fn build(self) -> Result<ImportOptions, FolioError> {
        if let Some(r) = self.options.page_range {
            if r.start < 1 {
                return Err(FolioError::InvalidConfig(format!(
                    "Pages are 1-indexed, got start {}",
                    r.start
                )));
            }
            if r.start > r.end {
                return Err(FolioError::InvalidConfig(format!(
                    "Invalid page range {}-{}: start must be <= end",
                    r.start, r.end
                )));
            }
        }
        Ok(self.options)
    }
}

// ── Folio creation ───────────────────────────────────────────────────────

/// What to do with pages classified as scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannedPageMode {
    /// Embed the rasterised page as the folio content. (default)
    #[default]
    Image,
    /// Insert descriptive text instead of the image.
    Placeholder,
    /// Drop the page; the folio list gets shorter.
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioOptions {
    pub scanned_page_mode: ScannedPageMode,
}

// ── Export: service config ───────────────────────────────────────────────

/// Where and how [`crate::export::PdfExportService`] talks to the render backend.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Backend endpoint receiving the JSON export request.
    /// Default: `http://localhost:3000/api/export/pdf`.
    pub endpoint: String,

    /// Retries after the first failed submission. Default: 3.
    pub max_retries: u32,

    /// Backoff unit in milliseconds; retry `n` waits `retry_backoff_ms × n`. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Bearer token sent to the backend.
    pub auth_token: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/export/pdf".to_string(),
            max_retries: 3,
            retry_backoff_ms: 1000,
            request_timeout_secs: 120,
            auth_token: None,
        }
    }
}

impl ExportConfig {
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<ExportConfig, FolioError> {
        let e = &self.config.endpoint;
        if !(e.starts_with("http://") || e.starts_with("https://")) {
            return Err(FolioError::InvalidConfig(format!(
                "Export endpoint must be an http(s) URL, got '{}'",
                e
            )));
        }
        Ok(self.config)
    }
}

// ── Export: per-call options ─────────────────────────────────────────────

/// Document properties written into the exported PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
    pub producer: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
}

impl Default for ExportMetadata {
    fn default() -> Self {
        Self {
            title: "Document".to_string(),
            author: String::new(),
            subject: String::new(),
            keywords: String::new(),
            creator: "folio-pipeline".to_string(),
            producer: concat!("folio-pipeline ", env!("CARGO_PKG_VERSION")).to_string(),
            creation_date: None,
            modification_date: None,
        }
    }
}

/// Options for one export call.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Keep only folios whose `index` lies in this inclusive range.
    pub page_range: Option<PageRange>,
    /// Resolve slots before rendering. Default: true.
    pub resolve_slots: bool,
    pub include_headers: bool,
    pub include_footers: bool,
    pub include_footnotes: bool,
    pub include_comments: bool,
    pub include_track_changes: bool,
    /// Output filename suggested to the backend. Default: derived from the title.
    pub filename: Option<String>,
    /// Caller-provided metadata; unset fields keep their defaults.
    pub metadata: ExportMetadata,
    pub document_id: String,
    /// Data sources supplied for this export only.
    pub data_sources: Vec<DataSource>,
    /// User overrides by slot id.
    pub user_values: HashMap<String, String>,
    /// Extra key/value pairs visible to dynamic and data slots.
    pub context_metadata: HashMap<String, Value>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_range: None,
            resolve_slots: true,
            include_headers: true,
            include_footers: true,
            include_footnotes: true,
            include_comments: false,
            include_track_changes: false,
            filename: None,
            metadata: ExportMetadata::default(),
            document_id: String::new(),
            data_sources: Vec::new(),
            user_values: HashMap::new(),
            context_metadata: HashMap::new(),
        }
    }
}

impl ExportOptions {
    pub fn builder() -> ExportOptionsBuilder {
        ExportOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ExportOptions`].
#[derive(Debug)]
pub struct ExportOptionsBuilder {
    options: ExportOptions,
}

impl ExportOptionsBuilder {
    pub fn page_range(mut self, range: PageRange) -> Self {
        self.options.page_range = Some(range);
        self
    }

    pub fn resolve_slots(mut self, v: bool) -> Self {
        self.options.resolve_slots = v;
        self
    }

    pub fn include_headers(mut self, v: bool) -> Self {
        self.options.include_headers = v;
        self
    }

    pub fn include_footers(mut self, v: bool) -> Self {
        self.options.include_footers = v;
        self
    }

    pub fn include_footnotes(mut self, v: bool) -> Self {
        self.options.include_footnotes = v;
        self
    }

    pub fn include_comments(mut self, v: bool) -> Self {
        self.options.include_comments = v;
        self
    }

    pub fn include_track_changes(mut self, v: bool) -> Self {
        self.options.include_track_changes = v;
        self
    }

    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.options.filename = Some(name.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.options.metadata.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.options.metadata.author = author.into();
        self
    }

    pub fn metadata(mut self, metadata: ExportMetadata) -> Self {
        self.options.metadata = metadata;
        self
    }

    pub fn document_id(mut self, id: impl Into<String>) -> Self {
        self.options.document_id = id.into();
        self
    }

    pub fn data_source(mut self, source: DataSource) -> Self {
        self.options.data_sources.push(source);
        self
    }

    pub fn user_value(mut self, slot_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.user_values.insert(slot_id.into(), value.into());
        self
    }

    pub fn context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.context_metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ExportOptions, FolioError> {
        if let Some(r) = self.options.page_range {
            if r.start > r.end {
                return Err(FolioError::InvalidConfig(format!(
                    "Invalid page range {}-{}: start must be <= end",
                    r.start, r.end
                )));
            }
        }
        Ok(self.options)
    }
}
