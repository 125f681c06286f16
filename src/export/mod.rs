//! PdfExportService: folios → resolved slots → markup → render backend.
//!
//! ## State machine
//!
//! ```text
//! preparing (5) ──▶ [resolving_slots (15)] ──▶ rendering (30‥60) ──▶ generating_pdf (60)
//!                                                                        │
//!                    complete (100) ◀── finalizing (90) ◀───────────────┘
//! ```
//!
//! Progress only moves forward and percentages never decrease.
//! `resolving_slots` is skipped when slot resolution is disabled. Any
//! failure ends the stream with `error`; a cancellation ends it with
//! `cancelled` and the call returns [`FolioError::Cancelled`]. Both keep
//! the last percentage reached.
//!
//! ## Retry policy
//!
//! Submission makes up to `max_retries + 1` attempts. Attempt `n` (counting
//! from 1 for the first retry) waits `retry_backoff_ms × n` first. Only
//! [`FolioError::is_retryable`] failures are retried. The cancel token is
//! raced against both the request and the backoff sleep, so cancelling
//! stops further attempts immediately.

pub mod backend;
pub mod cancel;
pub mod markup;
pub mod request;
pub mod styles;

pub use backend::{HttpRenderBackend, RenderBackend};
pub use cancel::CancelToken;
pub use markup::{BlockSerializer, ClientRenderer, FolioSerializer, PrintHtmlRenderer};
pub use request::{BackendReply, ExportRequest, ExportResponse, RequestFolio, RequestMetadata, RequestOptions};

use crate::config::{ExportConfig, ExportOptions};
use crate::error::FolioError;
use crate::model::{Folio, Slot};
use crate::progress::{ExportProgress, ExportProgressSink, ExportStatus};
use crate::slots::{HttpSourceFetcher, ResolutionContext, ResolutionResult, SlotResolver, SourceFetcher};
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The deliverable produced by an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub page_count: usize,
    /// `true` when the backend returned markup and the client renderer
    /// produced the file.
    pub client_rendered: bool,
}

impl ExportOutcome {
    /// Write the bytes to `path` atomically: a temp file in the target
    /// directory is persisted over `path` once fully written.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<(), FolioError> {
        let path = path.as_ref().to_path_buf();
        let bytes = self.bytes.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| FolioError::Internal(format!("Write task failed: {}", e)))?
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FolioError> {
    let write_err = |source: std::io::Error| FolioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".folio-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Orchestrates one export at a time; cheap to share behind an `Arc`.
pub struct PdfExportService {
    config: ExportConfig,
    backend: Arc<dyn RenderBackend>,
    serializer: Arc<dyn FolioSerializer>,
    client_renderer: Arc<dyn ClientRenderer>,
    fetcher: Arc<dyn SourceFetcher>,
}

impl PdfExportService {
    /// Service talking HTTP to `config.endpoint`, serialising folios with
    /// [`BlockSerializer`] and falling back to [`PrintHtmlRenderer`].
    pub fn new(config: ExportConfig) -> Result<Self, FolioError> {
        let backend = Arc::new(HttpRenderBackend::new(&config)?);
        let fetcher = Arc::new(HttpSourceFetcher::new(config.request_timeout_secs)?);
        Ok(Self::with_backend(config, backend).with_fetcher(fetcher))
    }

    /// Service using a caller-supplied render backend.
    pub fn with_backend(config: ExportConfig, backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            config,
            backend,
            serializer: Arc::new(BlockSerializer),
            client_renderer: Arc::new(PrintHtmlRenderer),
            fetcher: Arc::new(HttpSourceFetcher::with_client(reqwest::Client::new())),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn FolioSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_client_renderer(mut self, renderer: Arc<dyn ClientRenderer>) -> Self {
        self.client_renderer = renderer;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export without a way to cancel.
    pub async fn export(
        &self,
        folios: &[Folio],
        options: &ExportOptions,
        progress: &dyn ExportProgressSink,
    ) -> Result<ExportOutcome, FolioError> {
        self.export_with_cancel(folios, options, progress, &CancelToken::new())
            .await
    }

    /// Export, aborting as soon as `cancel` fires.
    ///
    /// The progress sink always receives a terminal status last.
    pub async fn export_with_cancel(
        &self,
        folios: &[Folio],
        options: &ExportOptions,
        progress: &dyn ExportProgressSink,
        cancel: &CancelToken,
    ) -> Result<ExportOutcome, FolioError> {
        let start = Instant::now();
        let mut reporter = Reporter::new(progress);

        match self.run(folios, options, &mut reporter, cancel).await {
            Ok(outcome) => {
                info!(
                    "Export complete: {} ({} pages, {} bytes) in {}ms",
                    outcome.filename,
                    outcome.page_count,
                    outcome.bytes.len(),
                    start.elapsed().as_millis()
                );
                Ok(outcome)
            }
            Err(e) if e.is_cancelled() => {
                info!("Export cancelled");
                reporter.terminal(ExportStatus::Cancelled, e.to_string(), None);
                Err(e)
            }
            Err(e) => {
                warn!("Export failed: {}", e);
                reporter.terminal(ExportStatus::Error, "Export failed".to_string(), Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        folios: &[Folio],
        options: &ExportOptions,
        reporter: &mut Reporter<'_>,
        cancel: &CancelToken,
    ) -> Result<ExportOutcome, FolioError> {
        // ── Step 1: Prepare ──────────────────────────────────────────────
        reporter.report(ExportProgress::new(ExportStatus::Preparing, 5, "Preparing export"));
        let now = Utc::now();
        let mut metadata = options.metadata.clone();
        metadata.creation_date = Some(now);
        metadata.modification_date = Some(now);
        let filename = options
            .filename
            .clone()
            .unwrap_or_else(|| default_filename(&metadata.title));

        // ── Step 2: Select folios ────────────────────────────────────────
        let selected: Vec<&Folio> = folios
            .iter()
            .filter(|f| options.page_range.is_none_or(|r| r.contains(f.index)))
            .collect();
        if selected.is_empty() {
            return Err(FolioError::InvalidConfig("No folios selected for export".to_string()));
        }
        let total = selected.len();
        info!("Exporting {} of {} folios as {}", total, folios.len(), filename);
        check_cancel(cancel)?;

        // ── Step 3: Resolve slots ────────────────────────────────────────
        let resolved = if options.resolve_slots {
            let slot_count: usize = selected.iter().map(|f| f.slots.len()).sum();
            reporter.report(ExportProgress::new(
                ExportStatus::ResolvingSlots,
                15,
                format!("Resolving {} slots", slot_count),
            ));
            let result = self.resolve_slots(&selected, options, now).await;
            if !result.errors.is_empty() {
                warn!("{} slots fell back to placeholder text", result.errors.len());
            }
            result.values
        } else {
            debug!("Slot resolution disabled");
            HashMap::new()
        };
        check_cancel(cancel)?;

        // ── Step 4: Serialise folios ─────────────────────────────────────
        reporter.report(ExportProgress::new(ExportStatus::Rendering, 30, "Rendering folios").pages(0, total));
        let mut request_folios = Vec::with_capacity(total);
        for (i, folio) in selected.iter().enumerate() {
            let html_content = self.serializer.serialize(folio, &resolved).map_err(|e| match e {
                FolioError::SerializationFailed { .. } => e,
                other => FolioError::SerializationFailed {
                    folio_id: folio.id.clone(),
                    detail: other.to_string(),
                },
            })?;
            request_folios.push(RequestFolio {
                id: folio.id.clone(),
                index: folio.index,
                orientation: folio.orientation,
                html_content,
                css_styles: styles::folio_css(folio.orientation),
            });

            let pct = 30 + (30 * (i + 1) / total) as u8;
            reporter.report(
                ExportProgress::new(
                    ExportStatus::Rendering,
                    pct,
                    format!("Rendering page {} of {}", i + 1, total),
                )
                .pages(i + 1, total),
            );
        }
        check_cancel(cancel)?;

        // ── Step 5: Submit ───────────────────────────────────────────────
        reporter.report(ExportProgress::new(ExportStatus::GeneratingPdf, 60, "Generating PDF").pages(total, total));
        let request = ExportRequest {
            folios: request_folios,
            options: RequestOptions::from_options(options, &filename),
            metadata: RequestMetadata::from_metadata(&metadata, now),
            resolved_slots: resolved.into_iter().collect::<BTreeMap<_, _>>(),
        };
        let reply = self.submit_with_retry(&request, cancel).await?;

        // ── Step 6: Finalise ─────────────────────────────────────────────
        reporter.report(ExportProgress::new(ExportStatus::Finalizing, 90, "Finalizing").pages(total, total));
        let outcome = match reply {
            BackendReply::Document {
                bytes,
                filename: backend_name,
                page_count,
            } => ExportOutcome {
                bytes,
                filename: backend_name.unwrap_or(filename),
                page_count: page_count.unwrap_or(total),
                client_rendered: false,
            },
            BackendReply::ClientRender {
                html,
                filename: backend_name,
                page_count,
            } => {
                info!("Backend asked for client-side rendering");
                check_cancel(cancel)?;
                self.client_renderer
                    .render(
                        &html,
                        &backend_name.unwrap_or(filename),
                        page_count.unwrap_or(total),
                        &metadata.title,
                    )
                    .await?
            }
        };

        reporter.report(
            ExportProgress::new(ExportStatus::Complete, 100, "Export complete").pages(outcome.page_count, outcome.page_count),
        );
        Ok(outcome)
    }

    /// One resolution pass per folio, all run concurrently on a fresh
    /// resolver so fetches are shared across folios.
    async fn resolve_slots(
        &self,
        selected: &[&Folio],
        options: &ExportOptions,
        now: chrono::DateTime<Utc>,
    ) -> ResolutionResult {
        let resolver = SlotResolver::new(Arc::clone(&self.fetcher));
        let total = selected.len();
        let base = base_context(options, now, total);

        let contexts: Vec<(ResolutionContext, &[Slot])> = selected
            .iter()
            .enumerate()
            .map(|(i, folio)| (base.clone().page(i + 1, total), folio.slots.as_slice()))
            .collect();

        let passes = join_all(
            contexts
                .iter()
                .map(|(ctx, slots)| resolver.resolve_all(slots, ctx)),
        )
        .await;

        let mut merged = ResolutionResult::default();
        for pass in passes {
            merged.merge(pass);
        }
        merged
    }

    async fn submit_with_retry(
        &self,
        request: &ExportRequest,
        cancel: &CancelToken,
    ) -> Result<BackendReply, FolioError> {
        let max_retries = self.config.max_retries;
        let mut last_err: Option<FolioError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = self.config.retry_backoff_ms * attempt as u64;
                warn!(
                    "Export submission: retry {}/{} after {}ms",
                    attempt, max_retries, backoff
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FolioError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(backoff)) => {}
                }
            }
            check_cancel(cancel)?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FolioError::Cancelled),
                r = self.backend.submit(request) => r,
            };

            match outcome {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() => {
                    warn!("Export submission attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let detail = match last_err {
            Some(FolioError::Network { detail, .. }) => detail,
            Some(other) => other.to_string(),
            None => "Unknown error".to_string(),
        };
        Err(FolioError::Network {
            attempts: max_retries + 1,
            detail,
        })
    }
}

/// Context shared by every folio's resolution pass.
fn base_context(options: &ExportOptions, now: chrono::DateTime<Utc>, total: usize) -> ResolutionContext {
    let mut ctx = ResolutionContext::new(options.document_id.clone())
        .page(1, total)
        .at(now);
    ctx.data_sources = options.data_sources.clone();
    ctx.user_values = options.user_values.clone();

    let m = &options.metadata;
    for (key, value) in [
        ("title", &m.title),
        ("author", &m.author),
        ("subject", &m.subject),
        ("keywords", &m.keywords),
    ] {
        if !value.is_empty() {
            ctx.metadata.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    if !options.document_id.is_empty() {
        ctx.metadata
            .insert("documentId".to_string(), Value::String(options.document_id.clone()));
    }
    // Caller-supplied context wins over the document properties.
    ctx.metadata.extend(options.context_metadata.clone());
    ctx
}

fn check_cancel(cancel: &CancelToken) -> Result<(), FolioError> {
    if cancel.is_cancelled() {
        Err(FolioError::Cancelled)
    } else {
        Ok(())
    }
}

/// `title` reduced to a safe file stem, with a `.pdf` extension.
fn default_filename(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{}.pdf", stem)
    }
}

/// Forwards snapshots to the sink, holding percentages non-decreasing.
struct Reporter<'a> {
    sink: &'a dyn ExportProgressSink,
    last: ExportProgress,
}

impl<'a> Reporter<'a> {
    fn new(sink: &'a dyn ExportProgressSink) -> Self {
        Self {
            sink,
            last: ExportProgress::new(ExportStatus::Preparing, 0, ""),
        }
    }

    fn report(&mut self, mut progress: ExportProgress) {
        progress.percentage = progress.percentage.max(self.last.percentage);
        debug!("Export {:?} {}%: {}", progress.status, progress.percentage, progress.message);
        self.sink.on_progress(&progress);
        self.last = progress;
    }

    fn terminal(&mut self, status: ExportStatus, message: String, error: Option<String>) {
        let mut progress = ExportProgress::new(status, self.last.percentage, message)
            .pages(self.last.current_page, self.last.total_pages);
        progress.error = error;
        self.report(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageRange;
    use crate::model::{Block, Orientation, SlotType};

    #[test]
    fn filenames_from_titles() {
        assert_eq!(default_filename("Rapport 2024"), "Rapport_2024.pdf");
        assert_eq!(default_filename("  "), "document.pdf");
        assert_eq!(default_filename("a/b"), "a_b.pdf");
    }

    #[test]
    fn base_context_merges_metadata() {
        let options = ExportOptions::builder()
            .title("Quarterly")
            .document_id("doc-1")
            .context_value("title", "Override")
            .user_value("s1", "v")
            .build()
            .unwrap();
        let ctx = base_context(&options, Utc::now(), 4);
        assert_eq!(ctx.metadata_text("title").as_deref(), Some("Override"));
        assert_eq!(ctx.metadata_text("documentId").as_deref(), Some("doc-1"));
        assert_eq!(ctx.total_pages, 4);
        assert_eq!(ctx.user_values["s1"], "v");
    }

    #[tokio::test]
    async fn write_to_is_atomic_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/report.pdf");
        let outcome = ExportOutcome {
            bytes: b"%PDF-1.7".to_vec(),
            filename: "report.pdf".into(),
            page_count: 1,
            client_rendered: false,
        };
        outcome.write_to(&path).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.7");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn page_numbers_follow_folio_position() {
        struct Unused;
        #[async_trait::async_trait]
        impl RenderBackend for Unused {
            async fn submit(&self, _r: &ExportRequest) -> Result<BackendReply, FolioError> {
                Err(FolioError::Internal("unused".into()))
            }
        }

        let folio = |index: usize| Folio {
            id: format!("f{index}"),
            index,
            orientation: Orientation::Portrait,
            content: vec![Block::Slot {
                slot_id: format!("p{index}"),
            }],
            slots: vec![Slot::new(format!("p{index}"), SlotType::DynamicContent).with_label("page of total")],
        };
        let folios = [folio(0), folio(1), folio(2)];
        let selected: Vec<&Folio> = folios.iter().filter(|f| PageRange::new(1, 2).contains(f.index)).collect();

        let service = PdfExportService::with_backend(ExportConfig::default(), Arc::new(Unused));
        let result = service
            .resolve_slots(&selected, &ExportOptions::default(), Utc::now())
            .await;
        assert_eq!(result.values["p1"], "Page 1 of 2");
        assert_eq!(result.values["p2"], "Page 2 of 2");
    }
}
