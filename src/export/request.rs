//! Wire types exchanged with the render backend.

use crate::config::{ExportMetadata, ExportOptions, PageRange};
use crate::model::Orientation;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The JSON body submitted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub folios: Vec<RequestFolio>,
    pub options: RequestOptions,
    pub metadata: RequestMetadata,
    pub resolved_slots: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFolio {
    pub id: String,
    pub index: usize,
    pub orientation: Orientation,
    pub html_content: String,
    pub css_styles: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_range: Option<PageRange>,
    pub resolve_slots: bool,
    pub include_headers: bool,
    pub include_footers: bool,
    pub include_footnotes: bool,
    pub include_comments: bool,
    pub include_track_changes: bool,
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub document_id: String,
}

impl RequestOptions {
    pub fn from_options(options: &ExportOptions, filename: &str) -> Self {
        Self {
            page_range: options.page_range,
            resolve_slots: options.resolve_slots,
            include_headers: options.include_headers,
            include_footers: options.include_footers,
            include_footnotes: options.include_footnotes,
            include_comments: options.include_comments,
            include_track_changes: options.include_track_changes,
            filename: filename.to_string(),
            document_id: options.document_id.clone(),
        }
    }
}

/// Document metadata with dates as ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
    pub producer: String,
    pub creation_date: String,
    pub modification_date: String,
}

impl RequestMetadata {
    /// Missing dates are stamped with `now`.
    pub fn from_metadata(metadata: &ExportMetadata, now: DateTime<Utc>) -> Self {
        let iso = |d: Option<DateTime<Utc>>| d.unwrap_or(now).to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            subject: metadata.subject.clone(),
            keywords: metadata.keywords.clone(),
            creator: metadata.creator.clone(),
            producer: metadata.producer.clone(),
            creation_date: iso(metadata.creation_date),
            modification_date: iso(metadata.modification_date),
        }
    }
}

/// JSON reply from the backend when it does not stream a PDF directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub page_count: Option<usize>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// A finished PDF.
    Document {
        bytes: Vec<u8>,
        filename: Option<String>,
        page_count: Option<usize>,
    },
    /// Markup the caller must render itself.
    ClientRender {
        html: String,
        filename: Option<String>,
        page_count: Option<usize>,
    },
}
