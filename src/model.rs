//! Data model shared by the import, resolution and export stages.
//!
//! Every type here is plain data with serde derives: import results are
//! handed to the editor as JSON, and folios travel back to the export
//! stage (and over the wire to the render backend) in the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Geometry ─────────────────────────────────────────────────────────────

/// Page orientation, derived once from page width vs. height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// `Landscape` only when strictly wider than tall; square pages are portrait.
    pub fn from_dimensions(width: f32, height: f32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

// ── Extraction output ────────────────────────────────────────────────────

/// One positioned run of text, in a top-down coordinate space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    /// Distance from the top edge of the page.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_name: String,
    pub font_size: f32,
}

/// One page as extracted from the source PDF. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPage {
    /// 1-indexed.
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub orientation: Orientation,
    /// Reconstructed reading text: spaces within a line, newlines between lines.
    pub text_content: String,
    pub text_items: Vec<TextItem>,
    /// `data:image/png;base64,…` when the page was rasterised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
    pub is_scanned: bool,
}

/// Document information dictionary, parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub page_count: usize,
}

/// Outcome of [`crate::extract::PageExtractor::import_pdf`].
///
/// `success = false` only for document-level failures; per-page failures
/// show up in `warnings` with the page missing from `pages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub total_pages: usize,
    pub pages: Vec<ExtractedPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ImportResult {
    pub(crate) fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

// ── Slots ────────────────────────────────────────────────────────────────

/// Kind of placeholder embedded in folio content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// Computed from the export context (page number, dates, title…).
    DynamicContent,
    /// Fetched from a registered data source via `@source.path`.
    AtFetcher,
    /// Data field looked up in context metadata or static sources.
    Donnee,
    /// Anchor.
    Ancre,
    /// Special section marker.
    SectionSpeciale,
    /// Comment annotation.
    Commentaire,
}

impl SlotType {
    /// Structural and annotation slots never contribute text to an export.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SlotType::Ancre | SlotType::SectionSpeciale | SlotType::Commentaire
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// A typed placeholder inside folio content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default)]
    pub metadata: SlotMetadata,
    #[serde(default)]
    pub is_filled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Slot {
    pub fn new(id: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            id: id.into(),
            slot_type,
            metadata: SlotMetadata::default(),
            is_filled: false,
            value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.metadata.label = Some(label.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.metadata.field = Some(field.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.metadata.default_value = Some(value.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.metadata.placeholder = Some(placeholder.into());
        self
    }

    /// Mark the slot as already filled by the user.
    pub fn filled(mut self, value: impl Into<String>) -> Self {
        self.is_filled = true;
        self.value = Some(value.into());
        self
    }

    /// Text used when resolution fails: the placeholder, else `[label]`, else `[id]`.
    pub fn fallback_text(&self) -> String {
        if let Some(ref p) = self.metadata.placeholder {
            return p.clone();
        }
        let name = self.metadata.label.as_deref().unwrap_or(&self.id);
        format!("[{}]", name)
    }
}

// ── Folios ───────────────────────────────────────────────────────────────

/// One block of folio content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        text: String,
    },
    Image {
        src: String,
        width: f32,
        height: f32,
    },
    /// Descriptive text standing in for content that could not be imported.
    Notice {
        text: String,
    },
    /// Reference to one of the folio's slots.
    Slot {
        slot_id: String,
    },
}

/// One logical page of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folio {
    pub id: String,
    /// 0-indexed position in the document.
    pub index: usize,
    pub orientation: Orientation,
    #[serde(default)]
    pub content: Vec<Block>,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl Folio {
    pub fn has_image(&self) -> bool {
        self.content.iter().any(|b| matches!(b, Block::Image { .. }))
    }

    /// Whether the folio came from a page image rather than extracted text:
    /// it carries a raster or a scanned-page notice.
    pub fn is_image_based(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, Block::Image { .. } | Block::Notice { .. }))
    }
}

/// Counts returned by [`crate::folio::folio_summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioSummary {
    pub portrait: usize,
    pub landscape: usize,
    pub text_based: usize,
    pub image_based: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(842.0, 595.0), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(595.0, 842.0), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(500.0, 500.0), Orientation::Portrait);
    }

    #[test]
    fn fallback_prefers_placeholder_then_label_then_id() {
        let s = Slot::new("s1", SlotType::Donnee);
        assert_eq!(s.fallback_text(), "[s1]");
        let s = s.with_label("Client");
        assert_eq!(s.fallback_text(), "[Client]");
        let s = s.with_placeholder("[X]");
        assert_eq!(s.fallback_text(), "[X]");
    }

    #[test]
    fn slot_json_shape() {
        let json = r#"{"id":"a","type":"at_fetcher","metadata":{"source":"@crm.client.name","defaultValue":"?"}}"#;
        let slot: Slot = serde_json::from_str(json).unwrap();
        assert_eq!(slot.slot_type, SlotType::AtFetcher);
        assert_eq!(slot.metadata.default_value.as_deref(), Some("?"));
        assert!(!slot.is_filled);
    }

    #[test]
    fn structural_kinds() {
        assert!(SlotType::Ancre.is_structural());
        assert!(SlotType::Commentaire.is_structural());
        assert!(!SlotType::Donnee.is_structural());
    }

    #[test]
    fn block_is_tagged() {
        let b = Block::Notice { text: "x".into() };
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["type"], "notice");
    }
}
