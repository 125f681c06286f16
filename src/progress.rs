//! Progress reporting for imports and exports.
//!
//! Imports report through [`ImportProgressCallback`] (per-page events);
//! exports report through [`ExportProgressSink`], which receives an
//! [`ExportProgress`] snapshot at every state transition and always ends
//! with a terminal status (`Complete`, `Error` or `Cancelled`).
//!
//! Both traits are `Send + Sync`: import callbacks fire from the blocking
//! extraction thread, export sinks from whichever task drives the export.
//!
//! # Example
//!
//! ```rust
//! use folio_pipeline::{ExportProgress, ExportProgressSink, ExportStatus};
//! use std::sync::Mutex;
//!
//! let seen = Mutex::new(Vec::new());
//! let sink = |p: &ExportProgress| seen.lock().unwrap().push(p.percentage);
//! sink.on_progress(&ExportProgress::new(ExportStatus::Preparing, 5, "Preparing export"));
//! assert_eq!(*seen.lock().unwrap(), vec![5]);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Import ───────────────────────────────────────────────────────────────

/// Called by the extractor as it processes each page.
///
/// All methods default to no-ops so implementors override only what they need.
pub trait ImportProgressCallback: Send + Sync {
    /// Called once the document is open and the page selection is known.
    fn on_import_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page was extracted.
    ///
    /// * `page_num` — 1-indexed page number
    /// * `char_count` — characters of reconstructed text on the page
    fn on_page_extracted(&self, page_num: usize, total_pages: usize, char_count: usize) {
        let _ = (page_num, total_pages, char_count);
    }

    /// Called when a page failed and was left out.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every selected page was attempted.
    fn on_import_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need import events.
pub struct NoopImportProgress;

impl ImportProgressCallback for NoopImportProgress {}

/// Shared handle to an import callback.
pub type ImportProgress = Arc<dyn ImportProgressCallback>;

// ── Export ───────────────────────────────────────────────────────────────

/// Export state. Progression is strictly forward; `Error` and `Cancelled`
/// are reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Preparing,
    ResolvingSlots,
    Rendering,
    GeneratingPdf,
    Finalizing,
    Complete,
    Error,
    Cancelled,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportStatus::Complete | ExportStatus::Error | ExportStatus::Cancelled
        )
    }
}

/// One progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub status: ExportStatus,
    /// 0–100, non-decreasing across one export.
    pub percentage: u8,
    pub message: String,
    pub current_page: usize,
    pub total_pages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportProgress {
    pub fn new(status: ExportStatus, percentage: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            percentage: percentage.min(100),
            message: message.into(),
            current_page: 0,
            total_pages: 0,
            error: None,
        }
    }

    pub fn pages(mut self, current: usize, total: usize) -> Self {
        self.current_page = current;
        self.total_pages = total;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Receives export progress snapshots.
pub trait ExportProgressSink: Send + Sync {
    fn on_progress(&self, progress: &ExportProgress);
}

impl<F> ExportProgressSink for F
where
    F: Fn(&ExportProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &ExportProgress) {
        self(progress)
    }
}

/// Discards every snapshot.
pub struct NoopExportProgress;

impl ExportProgressSink for NoopExportProgress {
    fn on_progress(&self, _progress: &ExportProgress) {}
}
