//! SlotResolver: turn slot placeholders into final strings.
//!
//! ## Precedence
//!
//! Strategies are tried in a fixed order, first `Some` wins:
//!
//! 1. [`Strategy::Cached`]       — value cached for `(slot id, page number)`
//! 2. [`Strategy::UserOverride`] — `context.user_values[slot.id]`
//! 3. [`Strategy::StoredValue`]  — slot already filled by the user
//! 4. [`Strategy::TypeSpecific`] — built-ins, data sources, metadata fields
//! 5. [`Strategy::Default`]      — `metadata.default_value`, else `""`
//!
//! Structural kinds (`ancre`, `section_speciale`, `commentaire`) always
//! resolve to `""` and never reach the list.
//!
//! ## Failures
//!
//! Resolution never fails towards the caller. A [`SlotError`] from any
//! strategy replaces the value with [`Slot::fallback_text`] and is reported
//! in [`ResolutionResult::errors`]; other slots are unaffected.
//!
//! ## Fetch deduplication
//!
//! `at_fetcher` fetches are keyed by [`FetchKey`]. The pending future itself
//! is stored (as a [`Shared`] future) before it is first polled, so any
//! number of concurrent slots naming the same field await one fetch and
//! observe the same value or the same error. Completed fetches, failed ones
//! included, stay cached until [`SlotResolver::clear_cache`].

pub mod builtin;
pub mod context;
pub mod source;

pub use builtin::{normalize_label, BuiltinField};
pub use context::{ResolutionContext, ResolutionResult, SlotFailure, SlotWarning};
pub use source::{DataSource, FetchKey, HttpSourceFetcher, SourceFetcher, SourceKind, SourceRef};

use crate::error::SlotError;
use crate::model::{Slot, SlotType};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

type SharedFetch = Shared<BoxFuture<'static, Result<Option<Value>, SlotError>>>;

/// One step of the precedence list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cached,
    UserOverride,
    StoredValue,
    TypeSpecific,
    Default,
}

impl Strategy {
    /// All strategies, in precedence order.
    pub const ORDER: [Strategy; 5] = [
        Strategy::Cached,
        Strategy::UserOverride,
        Strategy::StoredValue,
        Strategy::TypeSpecific,
        Strategy::Default,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ValueKey {
    slot_id: String,
    page_number: usize,
}

/// Result of resolving one slot, before it is folded into a [`ResolutionResult`].
#[derive(Debug)]
struct Resolved {
    value: String,
    error: Option<SlotError>,
    warning: Option<String>,
}

/// Resolves slots against a context, caching values and fetches.
///
/// Caches live as long as the resolver; create a new one or call
/// [`clear_cache`](Self::clear_cache) for fresh values.
pub struct SlotResolver {
    fetcher: Arc<dyn SourceFetcher>,
    sources: HashMap<String, DataSource>,
    values: Mutex<HashMap<ValueKey, String>>,
    in_flight: Mutex<HashMap<FetchKey, SharedFetch>>,
}

impl SlotResolver {
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            fetcher,
            sources: HashMap::new(),
            values: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Register a source for every later resolution. Replaces any source
    /// with the same id.
    pub fn register_source(&mut self, source: DataSource) {
        debug!("Registered data source '{}' ({:?})", source.id, source.kind);
        self.sources.insert(source.id.clone(), source);
    }

    /// Drop cached values and completed or pending fetches.
    pub fn clear_cache(&self) {
        lock(&self.values).clear();
        lock(&self.in_flight).clear();
    }

    /// Resolve one slot to its final text. Never fails.
    pub async fn resolve_slot(&self, slot: &Slot, ctx: &ResolutionContext) -> String {
        self.resolve_one(slot, ctx).await.value
    }

    /// Resolve every slot concurrently.
    ///
    /// All resolutions run to completion; one slot's failure never affects
    /// another's value.
    pub async fn resolve_all(&self, slots: &[Slot], ctx: &ResolutionContext) -> ResolutionResult {
        let outcomes = join_all(slots.iter().map(|slot| async move {
            (slot.id.clone(), self.resolve_one(slot, ctx).await)
        }))
        .await;

        let mut result = ResolutionResult::default();
        for (slot_id, resolved) in outcomes {
            if let Some(error) = resolved.error {
                result.errors.push(SlotFailure {
                    slot_id: slot_id.clone(),
                    error,
                });
            }
            if let Some(message) = resolved.warning {
                result.warnings.push(SlotWarning {
                    slot_id: slot_id.clone(),
                    message,
                });
            }
            result.values.insert(slot_id, resolved.value);
        }

        debug!(
            "Resolved {} slots on page {}: {} errors, {} warnings",
            result.values.len(),
            ctx.page_number,
            result.errors.len(),
            result.warnings.len()
        );
        result
    }

    async fn resolve_one(&self, slot: &Slot, ctx: &ResolutionContext) -> Resolved {
        if slot.slot_type.is_structural() {
            return Resolved {
                value: String::new(),
                error: None,
                warning: None,
            };
        }

        for strategy in Strategy::ORDER {
            match self.apply(strategy, slot, ctx).await {
                Ok(Some(value)) => {
                    if strategy != Strategy::Cached {
                        lock(&self.values).insert(value_key(slot, ctx), value.clone());
                    }
                    let warning = (strategy == Strategy::Default && value.is_empty())
                        .then(|| "no value found; resolved to empty text".to_string());
                    return Resolved {
                        value,
                        error: None,
                        warning,
                    };
                }
                Ok(None) => continue,
                Err(error) => {
                    let value = slot.fallback_text();
                    warn!("Slot '{}' fell back to '{}': {}", slot.id, value, error);
                    return Resolved {
                        value,
                        error: Some(error),
                        warning: None,
                    };
                }
            }
        }

        // Strategy::Default always yields a value.
        Resolved {
            value: String::new(),
            error: None,
            warning: None,
        }
    }

    /// Run one strategy. `Ok(None)` passes to the next.
    pub async fn apply(
        &self,
        strategy: Strategy,
        slot: &Slot,
        ctx: &ResolutionContext,
    ) -> Result<Option<String>, SlotError> {
        match strategy {
            Strategy::Cached => Ok(lock(&self.values).get(&value_key(slot, ctx)).cloned()),
            Strategy::UserOverride => Ok(ctx.user_values.get(&slot.id).cloned()),
            Strategy::StoredValue => Ok(slot.value.clone().filter(|_| slot.is_filled)),
            Strategy::TypeSpecific => self.resolve_by_type(slot, ctx).await,
            Strategy::Default => Ok(Some(slot.metadata.default_value.clone().unwrap_or_default())),
        }
    }

    async fn resolve_by_type(&self, slot: &Slot, ctx: &ResolutionContext) -> Result<Option<String>, SlotError> {
        match slot.slot_type {
            SlotType::DynamicContent => Ok(self.resolve_dynamic(slot, ctx)),
            SlotType::AtFetcher => self.resolve_fetch(slot, ctx).await,
            SlotType::Donnee => Ok(self.resolve_field(slot, ctx)),
            SlotType::Ancre | SlotType::SectionSpeciale | SlotType::Commentaire => Ok(Some(String::new())),
        }
    }

    fn resolve_dynamic(&self, slot: &Slot, ctx: &ResolutionContext) -> Option<String> {
        let label = slot.metadata.label.as_deref().or(slot.metadata.field.as_deref())?;
        if let Some(value) = BuiltinField::parse(label).and_then(|b| b.resolve(ctx)) {
            return Some(value);
        }
        ctx.metadata_text(label)
            .or_else(|| ctx.metadata_text(&normalize_label(label)))
    }

    fn resolve_field(&self, slot: &Slot, ctx: &ResolutionContext) -> Option<String> {
        let field = slot.metadata.field.as_deref()?;
        if let Some(value) = ctx.metadata_text(field) {
            return Some(value);
        }
        self.sources
            .values()
            .chain(ctx.data_sources.iter())
            .filter(|s| s.kind == SourceKind::Static)
            .filter_map(|s| s.data.as_ref())
            .find_map(|data| source::lookup_path(data, field).and_then(source::value_to_text))
    }

    async fn resolve_fetch(&self, slot: &Slot, ctx: &ResolutionContext) -> Result<Option<String>, SlotError> {
        let raw = slot
            .metadata
            .source
            .as_deref()
            .ok_or(SlotError::MissingMetadata { field: "source" })?;
        let source_ref = SourceRef::parse(raw)?;

        let source = self
            .sources
            .get(&source_ref.source_id)
            .or_else(|| ctx.data_sources.iter().find(|s| s.id == source_ref.source_id))
            .ok_or_else(|| SlotError::UnknownSource {
                source_id: source_ref.source_id.clone(),
            })?;

        if source.kind == SourceKind::Api && source.base_url.as_deref().is_none_or(str::is_empty) {
            return Err(SlotError::MissingBaseUrl {
                source_id: source.id.clone(),
            });
        }

        let value = self.fetch_shared(source.clone(), source_ref.fetch_key()).await?;
        Ok(value.as_ref().and_then(source::value_to_text))
    }

    async fn fetch_shared(&self, source: DataSource, key: FetchKey) -> Result<Option<Value>, SlotError> {
        let pending = {
            let mut in_flight = lock(&self.in_flight);
            in_flight
                .entry(key.clone())
                .or_insert_with(|| {
                    debug!("Fetching '{}' from '{}'", key.field_path, key.source_id);
                    let fetcher = Arc::clone(&self.fetcher);
                    let field_path = key.field_path.clone();
                    async move { fetcher.fetch(&source, &field_path).await }
                        .boxed()
                        .shared()
                })
                .clone()
        };
        pending.await
    }
}

fn value_key(slot: &Slot, ctx: &ResolutionContext) -> ValueKey {
    ValueKey {
        slot_id: slot.id.clone(),
        page_number: ctx.page_number,
    }
}

/// Lock a cache, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
