//! Data sources and the fetch seam behind `at_fetcher` slots.
//!
//! A slot references a field as `@sourceId.path.to.field` or
//! `@sourceId/segment.path`. [`SourceRef::parse`] splits that into the
//! source id and the field path; [`FetchKey`] is the typed dedup key the
//! resolver uses for in-flight fetches.
//!
//! Fetch strategy per [`SourceKind`]:
//!
//! | Kind       | Behaviour                                                  |
//! |------------|------------------------------------------------------------|
//! | `static`   | nested key lookup in the source's in-memory `data`         |
//! | `api`      | `GET {baseUrl}/{path with dots as slashes}`, bearer auth   |
//! | `database` | always `None` (no connectivity)                            |

use crate::error::{FolioError, SlotError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

static RE_SOURCE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z0-9_\-]+)[./](.+)$").unwrap());

// ── Sources ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Api,
    Database,
    Static,
}

/// An external data source slots can read from. Unique by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DataSource {
    pub fn api(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Api,
            base_url: Some(base_url.into()),
            auth_token: None,
            data: None,
        }
    }

    pub fn static_data(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Static,
            base_url: None,
            auth_token: None,
            data: Some(data),
        }
    }

    pub fn database(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Database,
            base_url: None,
            auth_token: None,
            data: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

// ── References and keys ──────────────────────────────────────────────────

/// A parsed `@sourceId.path` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub source_id: String,
    pub field_path: String,
}

impl SourceRef {
    pub fn parse(raw: &str) -> Result<Self, SlotError> {
        let caps = RE_SOURCE_REF
            .captures(raw.trim())
            .ok_or_else(|| SlotError::MalformedSource {
                source_ref: raw.to_string(),
            })?;
        Ok(Self {
            source_id: caps[1].to_string(),
            field_path: caps[2].to_string(),
        })
    }

    pub fn fetch_key(&self) -> FetchKey {
        FetchKey {
            source_id: self.source_id.clone(),
            field_path: self.field_path.clone(),
        }
    }
}

/// Key of one in-flight or completed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub source_id: String,
    pub field_path: String,
}

// ── Value helpers ────────────────────────────────────────────────────────

/// Walk `path` (segments separated by `.` or `/`) into a JSON value.
///
/// Numeric segments index arrays.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(['.', '/'])
        .filter(|s| !s.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Render a JSON value as slot text. `null` is "no value".
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

// ── Fetching ─────────────────────────────────────────────────────────────

/// Fetches one field from one data source.
///
/// `Ok(None)` means the source answered but has no value for the field.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &DataSource, field_path: &str)
        -> Result<Option<Value>, SlotError>;
}

/// Default fetcher: in-memory lookup for static sources, HTTP for API sources.
#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    client: reqwest::Client,
}

impl HttpSourceFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, FolioError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FolioError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_api(&self, source: &DataSource, field_path: &str) -> Result<Option<Value>, SlotError> {
        let base = source
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SlotError::MissingBaseUrl {
                source_id: source.id.clone(),
            })?;
        let url = api_url(base, field_path);
        debug!("Fetching {} for source '{}'", url, source.id);

        let mut request = self.client.get(&url);
        if let Some(ref token) = source.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| SlotError::Transport {
            source_id: source.id.clone(),
            detail: e.to_string(),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SlotError::Http {
                source_id: source.id.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SlotError::InvalidPayload {
            source_id: source.id.clone(),
            detail: e.to_string(),
        })?;

        // JSON when it parses, otherwise the raw body is the value.
        let value = serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.trim().to_string()));
        Ok(Some(value))
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &DataSource, field_path: &str) -> Result<Option<Value>, SlotError> {
        match source.kind {
            SourceKind::Static => Ok(source
                .data
                .as_ref()
                .and_then(|data| lookup_path(data, field_path))
                .cloned()),
            SourceKind::Api => self.fetch_api(source, field_path).await,
            SourceKind::Database => {
                debug!("Database source '{}' has no connection; no value", source.id);
                Ok(None)
            }
        }
    }
}

/// `base` joined with the field path, dots turned into path segments.
pub fn api_url(base: &str, field_path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        field_path.trim_start_matches('/').replace('.', "/")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dot_and_slash_references() {
        let r = SourceRef::parse("@crm.client.name").unwrap();
        assert_eq!(r.source_id, "crm");
        assert_eq!(r.field_path, "client.name");

        let r = SourceRef::parse("@erp/orders.total").unwrap();
        assert_eq!(r.source_id, "erp");
        assert_eq!(r.field_path, "orders.total");
    }

    #[test]
    fn rejects_malformed_references() {
        for raw in ["crm.client", "@crm", "@.x", "", "@crm."] {
            assert!(
                matches!(SourceRef::parse(raw), Err(SlotError::MalformedSource { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn nested_lookup() {
        let data = json!({"client": {"name": "ACME", "tags": ["a", "b"]}});
        assert_eq!(lookup_path(&data, "client.name"), Some(&json!("ACME")));
        assert_eq!(lookup_path(&data, "client/tags.1"), Some(&json!("b")));
        assert_eq!(lookup_path(&data, "client.missing"), None);
    }

    #[test]
    fn url_building() {
        assert_eq!(api_url("https://x.io/api/", "client.name"), "https://x.io/api/client/name");
        assert_eq!(api_url("https://x.io", "orders/total"), "https://x.io/orders/total");
    }

    #[test]
    fn text_rendering() {
        assert_eq!(value_to_text(&json!("x")).as_deref(), Some("x"));
        assert_eq!(value_to_text(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_to_text(&Value::Null), None);
    }

    #[tokio::test]
    async fn static_and_database_sources() {
        let fetcher = HttpSourceFetcher::with_client(reqwest::Client::new());
        let s = DataSource::static_data("s", json!({"a": {"b": 1}}));
        assert_eq!(fetcher.fetch(&s, "a.b").await.unwrap(), Some(json!(1)));
        let db = DataSource::database("db");
        assert_eq!(fetcher.fetch(&db, "anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn api_without_base_url_is_configuration_error() {
        let fetcher = HttpSourceFetcher::with_client(reqwest::Client::new());
        let mut s = DataSource::api("crm", "");
        s.base_url = None;
        let err = fetcher.fetch(&s, "x").await.unwrap_err();
        assert!(matches!(err, SlotError::MissingBaseUrl { .. }));
    }
}
