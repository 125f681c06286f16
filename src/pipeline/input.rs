//! Input validation: make sure we are about to hand a PDF to the engine.
//!
//! pdfium reports garbage input as a generic format error. Checking the
//! `%PDF` signature first gives callers a specific error and avoids loading
//! the engine for obviously wrong files.

use crate::error::FolioError;
use std::path::Path;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Verify the buffer starts with the PDF signature.
pub fn check_magic(bytes: &[u8]) -> Result<(), FolioError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(FolioError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// Read a local PDF file, mapping I/O failures to typed errors.
pub async fn read_pdf_file(path: &Path) -> Result<Vec<u8>, FolioError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FolioError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => FolioError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => FolioError::Internal(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    check_magic(&bytes)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
