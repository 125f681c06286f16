//! Folio → markup, and the client-side rendering fallback.
//!
//! The editor normally owns serialisation; [`FolioSerializer`] is the seam
//! it plugs into. [`BlockSerializer`] renders the crate's own [`Block`]
//! content for callers without an editor.
//!
//! [`Block`]: crate::model::Block

use crate::error::FolioError;
use crate::export::{styles, ExportOutcome};
use crate::folio::render_blocks;
use crate::model::{Folio, Orientation};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Serialises one folio's content to markup, with slot values substituted.
pub trait FolioSerializer: Send + Sync {
    fn serialize(&self, folio: &Folio, resolved: &HashMap<String, String>) -> Result<String, FolioError>;
}

/// Renders [`crate::model::Block`] content as HTML.
///
/// Slot text comes from `resolved`, then from a value the user filled in,
/// then from the slot's fallback text. Structural slots render nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockSerializer;

impl FolioSerializer for BlockSerializer {
    fn serialize(&self, folio: &Folio, resolved: &HashMap<String, String>) -> Result<String, FolioError> {
        Ok(render_blocks(folio, |slot| {
            if slot.slot_type.is_structural() {
                return String::new();
            }
            resolved
                .get(&slot.id)
                .cloned()
                .or_else(|| slot.value.clone().filter(|_| slot.is_filled))
                .unwrap_or_else(|| slot.fallback_text())
        }))
    }
}

/// Turns backend-returned markup into a deliverable when the backend did
/// not produce the PDF itself.
#[async_trait]
pub trait ClientRenderer: Send + Sync {
    async fn render(
        &self,
        html: &str,
        filename: &str,
        page_count: usize,
        title: &str,
    ) -> Result<ExportOutcome, FolioError>;
}

/// Wraps the markup in a standalone, print-ready HTML document that opens
/// the print dialog on load. Saved with an `.html` extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintHtmlRenderer;

#[async_trait]
impl ClientRenderer for PrintHtmlRenderer {
    async fn render(
        &self,
        html: &str,
        filename: &str,
        page_count: usize,
        title: &str,
    ) -> Result<ExportOutcome, FolioError> {
        let document = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n{}\n<script>window.addEventListener('load', function () {{ window.print(); }});</script>\n</body>\n</html>\n",
            html_escape::encode_text(title),
            styles::folio_css(Orientation::Portrait),
            html
        );
        let filename = html_filename(filename);
        debug!("Client render: {} bytes → {}", document.len(), filename);

        Ok(ExportOutcome {
            bytes: document.into_bytes(),
            filename,
            page_count,
            client_rendered: true,
        })
    }
}

fn html_filename(filename: &str) -> String {
    let stem = filename
        .strip_suffix(".pdf")
        .or_else(|| filename.strip_suffix(".PDF"))
        .unwrap_or(filename);
    format!("{}.html", stem)
}
