//! Export orchestration tests with a scripted render backend.

use async_trait::async_trait;
use folio_pipeline::export::{BackendReply, ExportRequest, RenderBackend};
use folio_pipeline::{
    Block, CancelToken, ExportConfig, ExportOptions, ExportProgress, ExportStatus, Folio,
    FolioError, Orientation, PageRange, PdfExportService, Slot, SlotType,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted backend ─────────────────────────────────────────────────────────

/// Replays scripted replies; once the script runs out, repeats `fallback`.
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<BackendReply, FolioError>>>,
    fallback: fn() -> Result<BackendReply, FolioError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ExportRequest>>,
}

impl ScriptedBackend {
    fn new(
        script: Vec<Result<BackendReply, FolioError>>,
        fallback: fn() -> Result<BackendReply, FolioError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self) -> ExportRequest {
        self.last_request.lock().unwrap().clone().unwrap()
    }
}

#[async_trait]
impl RenderBackend for ScriptedBackend {
    async fn submit(&self, request: &ExportRequest) -> Result<BackendReply, FolioError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(self.fallback)
    }
}

fn pdf() -> Result<BackendReply, FolioError> {
    Ok(BackendReply::Document {
        bytes: b"%PDF-1.7 rendered".to_vec(),
        filename: None,
        page_count: None,
    })
}

fn unavailable() -> Result<BackendReply, FolioError> {
    Err(FolioError::Network {
        attempts: 1,
        detail: "HTTP 503 Service Unavailable".into(),
    })
}

fn rejected() -> Result<BackendReply, FolioError> {
    Err(FolioError::BackendRejected {
        message: "template missing".into(),
    })
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn folios(n: usize) -> Vec<Folio> {
    (0..n)
        .map(|i| Folio {
            id: format!("folio-{i}"),
            index: i,
            orientation: if i % 2 == 0 {
                Orientation::Portrait
            } else {
                Orientation::Landscape
            },
            content: vec![
                Block::Paragraph {
                    text: format!("Body of page {}", i + 1),
                },
                Block::Slot {
                    slot_id: format!("pn-{i}"),
                },
                Block::Slot {
                    slot_id: format!("client-{i}"),
                },
            ],
            slots: vec![
                Slot::new(format!("pn-{i}"), SlotType::DynamicContent).with_label("page of total"),
                Slot::new(format!("client-{i}"), SlotType::Donnee)
                    .with_field("client.name")
                    .with_label("Client"),
            ],
        })
        .collect()
}

fn config(max_retries: u32, backoff_ms: u64) -> ExportConfig {
    ExportConfig::builder()
        .max_retries(max_retries)
        .retry_backoff_ms(backoff_ms)
        .build()
        .unwrap()
}

fn options() -> ExportOptions {
    ExportOptions::builder()
        .title("Quarterly Report")
        .context_value("client", serde_json::json!({"name": "ACME"}))
        .build()
        .unwrap()
}

#[derive(Default)]
struct Recorder(Mutex<Vec<ExportProgress>>);

impl Recorder {
    fn sink(&self) -> impl Fn(&ExportProgress) + Send + Sync + '_ {
        move |p: &ExportProgress| self.0.lock().unwrap().push(p.clone())
    }

    fn statuses(&self) -> Vec<ExportStatus> {
        self.0.lock().unwrap().iter().map(|p| p.status).collect()
    }

    fn last(&self) -> ExportProgress {
        self.0.lock().unwrap().last().cloned().unwrap()
    }

    fn assert_monotone(&self) {
        let seen = self.0.lock().unwrap();
        for pair in seen.windows(2) {
            assert!(
                pair[1].percentage >= pair[0].percentage,
                "progress went backwards: {:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_reports_every_stage_and_completes() {
    let backend = ScriptedBackend::new(vec![], pdf);
    let service = PdfExportService::with_backend(config(0, 1), backend.clone());
    let recorder = Recorder::default();

    let outcome = service
        .export(&folios(3), &options(), &recorder.sink())
        .await
        .unwrap();

    assert_eq!(outcome.filename, "Quarterly_Report.pdf");
    assert_eq!(outcome.page_count, 3);
    assert!(!outcome.client_rendered);
    assert!(outcome.bytes.starts_with(b"%PDF"));

    recorder.assert_monotone();
    let statuses = recorder.statuses();
    assert_eq!(statuses.first(), Some(&ExportStatus::Preparing));
    for stage in [
        ExportStatus::ResolvingSlots,
        ExportStatus::Rendering,
        ExportStatus::GeneratingPdf,
        ExportStatus::Finalizing,
    ] {
        assert!(statuses.contains(&stage), "missing {:?}", stage);
    }
    let last = recorder.last();
    assert_eq!(last.status, ExportStatus::Complete);
    assert_eq!(last.percentage, 100);
}

#[tokio::test]
async fn request_carries_resolved_slots_per_folio() {
    let backend = ScriptedBackend::new(vec![], pdf);
    let service = PdfExportService::with_backend(config(0, 1), backend.clone());

    service
        .export(&folios(2), &options(), &folio_pipeline::NoopExportProgress)
        .await
        .unwrap();

    let request = backend.request();
    assert_eq!(request.folios.len(), 2);
    assert_eq!(request.resolved_slots["pn-0"], "Page 1 of 2");
    assert_eq!(request.resolved_slots["pn-1"], "Page 2 of 2");
    assert_eq!(request.resolved_slots["client-1"], "ACME");
    assert!(request.folios[1].html_content.contains("Page 2 of 2"));
    assert!(request.folios[1].css_styles.contains("landscape"));
    assert_eq!(request.metadata.title, "Quarterly Report");
    assert!(!request.metadata.creation_date.is_empty());
}

#[tokio::test]
async fn disabled_resolution_skips_the_stage() {
    let backend = ScriptedBackend::new(vec![], pdf);
    let service = PdfExportService::with_backend(config(0, 1), backend.clone());
    let recorder = Recorder::default();
    let options = ExportOptions::builder().resolve_slots(false).build().unwrap();

    service
        .export(&folios(1), &options, &recorder.sink())
        .await
        .unwrap();

    assert!(!recorder.statuses().contains(&ExportStatus::ResolvingSlots));
    let request = backend.request();
    assert!(request.resolved_slots.is_empty());
    assert!(request.folios[0].html_content.contains("[Client]"));
}

#[tokio::test]
async fn page_range_selects_by_folio_index() {
    let backend = ScriptedBackend::new(vec![], pdf);
    let service = PdfExportService::with_backend(config(0, 1), backend.clone());

    let options = ExportOptions::builder()
        .page_range(PageRange::new(1, 2))
        .build()
        .unwrap();
    let outcome = service
        .export(&folios(4), &options, &folio_pipeline::NoopExportProgress)
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 2);
    let ids: Vec<String> = backend.request().folios.iter().map(|f| f.id.clone()).collect();
    assert_eq!(ids, vec!["folio-1", "folio-2"]);

    let options = ExportOptions::builder()
        .page_range(PageRange::new(10, 12))
        .build()
        .unwrap();
    let err = service
        .export(&folios(4), &options, &folio_pipeline::NoopExportProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, FolioError::InvalidConfig(_)));
}

// ── Retries ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failures_are_retried() {
    let backend = ScriptedBackend::new(vec![unavailable(), unavailable()], pdf);
    let service = PdfExportService::with_backend(config(3, 1), backend.clone());

    let outcome = service
        .export(&folios(1), &options(), &folio_pipeline::NoopExportProgress)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 3);
    assert_eq!(outcome.page_count, 1);
}

#[tokio::test]
async fn exhausted_retries_report_attempt_count() {
    let backend = ScriptedBackend::new(vec![], unavailable);
    let service = PdfExportService::with_backend(config(2, 1), backend.clone());
    let recorder = Recorder::default();

    let err = service
        .export(&folios(1), &options(), &recorder.sink())
        .await
        .unwrap_err();

    assert_eq!(backend.calls(), 3);
    assert!(matches!(err, FolioError::Network { attempts: 3, .. }));
    let last = recorder.last();
    assert_eq!(last.status, ExportStatus::Error);
    assert!(last.error.unwrap().contains("503"));
    recorder.assert_monotone();
}

#[tokio::test]
async fn rejection_is_not_retried() {
    let backend = ScriptedBackend::new(vec![], rejected);
    let service = PdfExportService::with_backend(config(5, 1), backend.clone());
    let recorder = Recorder::default();

    let err = service
        .export(&folios(1), &options(), &recorder.sink())
        .await
        .unwrap_err();

    assert_eq!(backend.calls(), 1);
    assert!(matches!(err, FolioError::BackendRejected { .. }));
    assert_eq!(recorder.last().status, ExportStatus::Error);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_during_backoff_stops_retrying() {
    let backend = ScriptedBackend::new(vec![], unavailable);
    let service = PdfExportService::with_backend(config(3, 10_000), backend.clone());
    let recorder = Recorder::default();
    let cancel = CancelToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        service.export_with_cancel(&folios(1), &options(), &recorder.sink(), &cancel),
    )
    .await
    .expect("cancellation should interrupt the backoff")
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(backend.calls(), 1);
    assert_eq!(recorder.last().status, ExportStatus::Cancelled);
}

#[tokio::test]
async fn cancelled_before_start_never_submits() {
    let backend = ScriptedBackend::new(vec![], pdf);
    let service = PdfExportService::with_backend(config(0, 1), backend.clone());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = service
        .export_with_cancel(&folios(2), &options(), &folio_pipeline::NoopExportProgress, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, FolioError::Cancelled));
    assert_eq!(backend.calls(), 0);
}

// ── Client-side rendering ────────────────────────────────────────────────────

#[tokio::test]
async fn markup_reply_falls_back_to_client_render() {
    fn markup() -> Result<BackendReply, FolioError> {
        Ok(BackendReply::ClientRender {
            html: "<section>rendered</section>".into(),
            filename: Some("report.pdf".into()),
            page_count: None,
        })
    }
    let backend = ScriptedBackend::new(vec![], markup);
    let service = PdfExportService::with_backend(config(0, 1), backend.clone());

    let outcome = service
        .export(&folios(2), &options(), &folio_pipeline::NoopExportProgress)
        .await
        .unwrap();

    assert!(outcome.client_rendered);
    assert_eq!(outcome.filename, "report.html");
    assert_eq!(outcome.page_count, 2);
    let html = String::from_utf8(outcome.bytes).unwrap();
    assert!(html.contains("<section>rendered</section>"));
    assert!(html.contains("window.print()"));
    assert!(html.contains("<title>Quarterly Report</title>"));
}

#[tokio::test]
async fn outcome_is_written_to_disk() {
    let backend = ScriptedBackend::new(vec![], pdf);
    let service = PdfExportService::with_backend(config(0, 1), backend);
    let outcome = service
        .export(&folios(1), &options(), &folio_pipeline::NoopExportProgress)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join(&outcome.filename);
    outcome.write_to(&path).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 rendered");
}
