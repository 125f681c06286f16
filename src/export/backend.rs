//! Render backends: where an [`ExportRequest`] becomes a PDF.
//!
//! [`HttpRenderBackend`] POSTs the request as JSON and understands four
//! reply shapes:
//!
//! | Reply                                   | Result                          |
//! |-----------------------------------------|---------------------------------|
//! | `application/pdf` body                  | [`BackendReply::Document`]      |
//! | JSON `success: true` with `html`        | [`BackendReply::ClientRender`]  |
//! | JSON `success: true` with `downloadUrl` | document fetched with a GET     |
//! | JSON `success: false`                   | [`FolioError::BackendRejected`] |
//!
//! Transport errors, 5xx and 429 come back as [`FolioError::Network`] and
//! are retried by the export service; everything else is final.

use crate::config::ExportConfig;
use crate::error::FolioError;
use crate::export::request::{BackendReply, ExportRequest, ExportResponse};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

static RE_DISPOSITION_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).unwrap());

/// RFC 5987 extended value: `filename*=charset'lang'percent-encoded`.
static RE_DISPOSITION_FILENAME_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\*\s*=\s*([^';]*)'[^';]*'([^;\s]+)"#).unwrap());

/// Header carrying the rendered page count alongside a PDF body.
pub const PAGE_COUNT_HEADER: &str = "x-page-count";

/// Submits one export request. Implementations make a single attempt;
/// retries and cancellation belong to the caller.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn submit(&self, request: &ExportRequest) -> Result<BackendReply, FolioError>;
}

/// Render backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRenderBackend {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpRenderBackend {
    pub fn new(config: &ExportConfig) -> Result<Self, FolioError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FolioError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn download(&self, url: &str, filename: Option<String>, page_count: Option<usize>) -> Result<BackendReply, FolioError> {
        debug!("Downloading rendered PDF from {}", url);
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(network)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(network)?;
        Ok(BackendReply::Document {
            bytes: bytes.to_vec(),
            filename,
            page_count,
        })
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn submit(&self, request: &ExportRequest) -> Result<BackendReply, FolioError> {
        info!(
            "Submitting {} folios to {}",
            request.folios.len(),
            self.endpoint
        );
        let response = self
            .authorize(self.client.post(&self.endpoint))
            .json(request)
            .send()
            .await
            .map_err(network)?;
        let response = check_status(response).await?;

        if is_pdf(response.headers()) {
            let filename = disposition_filename(response.headers());
            let page_count = response
                .headers()
                .get(PAGE_COUNT_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let bytes = response.bytes().await.map_err(network)?;
            debug!("Backend returned {} PDF bytes", bytes.len());
            return Ok(BackendReply::Document {
                bytes: bytes.to_vec(),
                filename,
                page_count,
            });
        }

        let body = response.text().await.map_err(network)?;
        let reply: ExportResponse = serde_json::from_str(&body).map_err(|e| FolioError::BackendRejected {
            message: format!("unreadable response: {}", e),
        })?;
        interpret(reply, self).await
    }
}

async fn interpret(reply: ExportResponse, backend: &HttpRenderBackend) -> Result<BackendReply, FolioError> {
    if !reply.success {
        return Err(FolioError::BackendRejected {
            message: reply.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    if let Some(html) = reply.html {
        return Ok(BackendReply::ClientRender {
            html,
            filename: reply.filename,
            page_count: reply.page_count,
        });
    }
    match reply.download_url {
        Some(url) => backend.download(&url, reply.filename, reply.page_count).await,
        None => Err(FolioError::BackendRejected {
            message: "response carried neither a document nor markup".to_string(),
        }),
    }
}

/// Map a non-success status to an error: 5xx and 429 are retryable.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FolioError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FolioError::Network {
            attempts: 1,
            detail: format!("HTTP {}", status),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ExportResponse>(&body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| format!("HTTP {}", status));
    Err(FolioError::BackendRejected { message })
}

fn network(e: reqwest::Error) -> FolioError {
    FolioError::Network {
        attempts: 1,
        detail: e.to_string(),
    }
}

fn is_pdf(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/pdf"))
}

/// Filename from a `Content-Disposition` header, if any.
///
/// `filename*` wins over `filename` when both are present (RFC 6266 §4.3);
/// its percent-encoding is decoded.
pub fn disposition_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;

    let extended = RE_DISPOSITION_FILENAME_EXT.captures(value).map(|c| {
        let decoded = percent_decode_str(&c[2]);
        if c[1].eq_ignore_ascii_case("utf-8") {
            decoded
                .decode_utf8()
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| c[2].to_string())
        } else {
            decoded.decode_utf8_lossy().into_owned()
        }
    });

    extended
        .or_else(|| RE_DISPOSITION_FILENAME.captures(value).map(|c| c[1].to_string()))
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}
