//! Resolution context and result types.

use crate::error::SlotError;
use crate::slots::source::{lookup_path, value_to_text, DataSource};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Snapshot of everything one resolution pass may read.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub document_id: String,
    /// 1-indexed page the slots belong to.
    pub page_number: usize,
    pub total_pages: usize,
    pub metadata: HashMap<String, Value>,
    /// Sources supplied for this pass only; consulted after the resolver's registry.
    pub data_sources: Vec<DataSource>,
    /// Per-slot user overrides, keyed by slot id.
    pub user_values: HashMap<String, String>,
    pub now: DateTime<Utc>,
}

impl ResolutionContext {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            page_number: 1,
            total_pages: 1,
            metadata: HashMap::new(),
            data_sources: Vec::new(),
            user_values: HashMap::new(),
            now: Utc::now(),
        }
    }

    pub fn page(mut self, page_number: usize, total_pages: usize) -> Self {
        self.page_number = page_number;
        self.total_pages = total_pages;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn data_source(mut self, source: DataSource) -> Self {
        self.data_sources.push(source);
        self
    }

    pub fn user_value(mut self, slot_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_values.insert(slot_id.into(), value.into());
        self
    }

    /// Look `path` up in the metadata: the whole string as a key first,
    /// then as a dotted path into nested values.
    pub fn metadata_value(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.metadata.get(path) {
            return Some(v);
        }
        let (head, rest) = path.split_once('.')?;
        lookup_path(self.metadata.get(head)?, rest)
    }

    pub fn metadata_text(&self, path: &str) -> Option<String> {
        self.metadata_value(path).and_then(value_to_text)
    }
}

/// A slot whose resolution failed; its value fell back to placeholder text.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFailure {
    pub slot_id: String,
    pub error: SlotError,
}

/// A slot that resolved, but only to its default or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotWarning {
    pub slot_id: String,
    pub message: String,
}

/// Outcome of [`crate::slots::SlotResolver::resolve_all`].
///
/// `values` holds one entry per distinct input slot id, failures included.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub values: HashMap<String, String>,
    pub errors: Vec<SlotFailure>,
    pub warnings: Vec<SlotWarning>,
}

impl ResolutionResult {
    /// Fold another pass into this one.
    pub fn merge(&mut self, other: ResolutionResult) {
        self.values.extend(other.values);
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}
