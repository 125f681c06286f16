//! Error types for the folio-pipeline library.
//!
//! Three error types reflect three scopes of failure:
//!
//! * [`FolioError`] — **Fatal**: the whole import or export cannot proceed
//!   (unreadable file, wrong password, backend unreachable after retries,
//!   cancellation). Returned as `Err(FolioError)` from the top-level entry
//!   points.
//!
//! * [`PageError`] — **Non-fatal**: one page could not be extracted. The
//!   page is left out of [`crate::model::ImportResult::pages`] and the error
//!   text is recorded in `warnings`.
//!
//! * [`SlotError`] — **Non-fatal**: one placeholder could not be resolved.
//!   Recorded in [`crate::slots::ResolutionResult::errors`] while the slot
//!   falls back to its placeholder text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the folio-pipeline library.
#[derive(Debug, Error)]
pub enum FolioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The byte buffer does not start with the `%PDF` signature.
    #[error("Input is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    // ── Document open errors ──────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF")]
    WrongPassword,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Export errors ─────────────────────────────────────────────────────
    /// The render backend could not be reached, or kept failing.
    #[error("Export request failed after {attempts} attempt(s): {detail}")]
    Network { attempts: u32, detail: String },

    /// The render backend answered but refused the request.
    #[error("Render backend rejected the export: {message}")]
    BackendRejected { message: String },

    /// The caller cancelled the export.
    #[error("Export cancelled")]
    Cancelled,

    /// The editor-side serializer could not produce markup for a folio.
    #[error("Failed to serialize folio {folio_id}: {detail}")]
    SerializationFailed { folio_id: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FolioError {
    /// Whether an export submission that failed with this error may succeed
    /// on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FolioError::Network { .. })
    }

    /// Whether this error is the result of an explicit cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FolioError::Cancelled)
    }

    /// True for the document-level failures that make an import return zero pages.
    pub fn is_document_open_error(&self) -> bool {
        matches!(
            self,
            FolioError::NotAPdf { .. }
                | FolioError::CorruptPdf { .. }
                | FolioError::PasswordRequired
                | FolioError::WrongPassword
        )
    }
}

/// A non-fatal error for a single page.
///
/// The page is dropped from the import result; the overall import continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The engine could not load the page object.
    #[error("Page {page}: could not be loaded: {detail}")]
    PageNotFound { page: usize, detail: String },

    /// Page size could not be read.
    #[error("Page {page}: geometry unavailable: {detail}")]
    GeometryFailed { page: usize, detail: String },

    /// Text objects could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextFailed { page: usize, detail: String },

    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RasterFailed { page: usize, detail: String },

    /// The rasterised page could not be encoded.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::PageNotFound { page, .. }
            | PageError::GeometryFailed { page, .. }
            | PageError::TextFailed { page, .. }
            | PageError::RasterFailed { page, .. }
            | PageError::EncodeFailed { page, .. } => *page,
        }
    }
}

/// A non-fatal error while resolving one slot.
///
/// `Clone` because a single in-flight fetch hands the same outcome to every
/// slot waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// `metadata.source` is missing or not of the form `@source.path`.
    #[error("malformed source reference '{source_ref}'")]
    MalformedSource { source_ref: String },

    /// No data source with this id is registered or supplied.
    #[error("unknown data source '{source_id}'")]
    UnknownSource { source_id: String },

    /// An `api` data source has no base URL.
    #[error("data source '{source_id}' has no base URL")]
    MissingBaseUrl { source_id: String },

    /// The API answered with a non-success status.
    #[error("data source '{source_id}' returned HTTP {status}")]
    Http { source_id: String, status: u16 },

    /// The API could not be reached.
    #[error("data source '{source_id}' unreachable: {detail}")]
    Transport { source_id: String, detail: String },

    /// The API answered with something that is not JSON.
    #[error("data source '{source_id}' returned an invalid payload: {detail}")]
    InvalidPayload { source_id: String, detail: String },

    /// Slot metadata is missing a field its type requires.
    #[error("slot is missing required metadata '{field}'")]
    MissingMetadata { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_is_retryable() {
        let e = FolioError::Network {
            attempts: 2,
            detail: "connection refused".into(),
        };
        assert!(e.is_retryable());
        assert!(!e.is_cancelled());
        assert!(e.to_string().contains("2 attempt"));
    }

    #[test]
    fn cancellation_is_not_retryable() {
        let e = FolioError::Cancelled;
        assert!(!e.is_retryable());
        assert!(e.is_cancelled());
        assert_eq!(e.to_string(), "Export cancelled");
    }

    #[test]
    fn rejection_is_terminal() {
        let e = FolioError::BackendRejected {
            message: "bad folio".into(),
        };
        assert!(!e.is_retryable());
    }

    #[test]
    fn document_open_family() {
        assert!(FolioError::WrongPassword.is_document_open_error());
        assert!(FolioError::CorruptPdf { detail: "xref".into() }.is_document_open_error());
        assert!(!FolioError::Cancelled.is_document_open_error());
    }

    #[test]
    fn page_error_mentions_page() {
        let e = PageError::TextFailed {
            page: 2,
            detail: "boom".into(),
        };
        assert_eq!(e.page(), 2);
        assert!(e.to_string().contains("Page 2"));
    }

    #[test]
    fn slot_error_display() {
        let e = SlotError::UnknownSource {
            source_id: "crm".into(),
        };
        assert!(e.to_string().contains("crm"));
    }
}
