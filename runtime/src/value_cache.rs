//! Per-context expression value cache and the subscriber-bookkeeping needed
//! to implement quiet re-execution and cache-hit deduplication.
//!
//! Modeled on a `ComputedValueInfoRegistry`: a
//! `RefCell<HashMap<ExpressionId, _>>` plus a `Publisher` of "which ids
//! changed" batches. This runtime generalizes that registry from "typename
//! + method call" to the full [`ExpressionResult`] payload and adds the
//! per-subscription dedup bookkeeping needed on top of it.

use common::prelude::*;
use protocol::prelude::*;
use std::collections::HashSet;

/// One notification-worthy change to a context's cache.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheEvent {
    /// A fresh value, error, or panic was written for `expression_id`.
    Updated { expression_id: ExpressionId, result: ExpressionResult },
    /// A subscriber observed a cache hit for `expression_id` it had not
    /// already been told about.
    CacheHit { expression_id: ExpressionId, result: ExpressionResult },
    /// `expression_id` was invalidated (its entry removed).
    Invalidated { expression_id: ExpressionId },
}

/// The per-context expression value cache.
///
/// `ValueCache` itself decides whether a write is notification-worthy; it
/// does not track *which subscribers* have seen what; that bookkeeping
/// lives in [`SubscriptionTracker`], one per subscribed session, since "has
/// this subscriber seen this cache hit" is inherently per-subscription.
#[derive(Clone, Debug, Default)]
pub struct ValueCache {
    entries: HashMap<ExpressionId, ExpressionResult>,
}

impl ValueCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current entry for `id`, if any.
    pub fn get(&self, id: &ExpressionId) -> Option<&ExpressionResult> {
        self.entries.get(id)
    }

    /// Whether the cache currently holds a value for `id`.
    pub fn contains(&self, id: &ExpressionId) -> bool {
        self.entries.contains_key(id)
    }

    /// All expression ids currently cached.
    pub fn ids(&self) -> impl Iterator<Item = &ExpressionId> {
        self.entries.keys()
    }

    /// Write a freshly computed result for `id`.
    ///
    /// Returns `Some(event)` if this write is notification-worthy per the
    /// quiet-re-execution rule: a `Value` result whose `type_name` and
    /// `method_call` are unchanged from the prior entry is suppressed;
    /// `DataflowError`, `Panic`, and `Pending` payloads always notify, as do
    /// first-time writes and type/method-call changes.
    pub fn write(&mut self, id: ExpressionId, mut result: ExpressionResult) -> Option<CacheEvent> {
        result.from_cache = false;
        let quiet = match (&result.payload, self.entries.get(&id)) {
            (ExpressionPayload::Value(_), Some(previous)) => previous.same_observable_type(&result),
            _ => false,
        };
        self.entries.insert(id, result.clone());
        if quiet {
            None
        } else {
            Some(CacheEvent::Updated { expression_id: id, result })
        }
    }

    /// Remove the entry for `id`, if present.
    ///
    /// Returns `true` if an entry was actually removed (used to decide
    /// whether an `Invalidated` event should be emitted).
    pub fn invalidate(&mut self, id: &ExpressionId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Remove every entry whose id is in `ids`. Returns the ids actually
    /// removed.
    pub fn invalidate_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a ExpressionId>) -> Vec<ExpressionId> {
        ids.into_iter().filter(|id| self.invalidate(id)).copied().collect()
    }

    /// Clear every entry. Returns the ids that were removed.
    pub fn clear(&mut self) -> Vec<ExpressionId> {
        let removed = self.entries.keys().copied().collect_vec();
        self.entries.clear();
        removed
    }

    /// Record a cache hit for `id`, assuming the entry exists. Does not
    /// itself decide whether this is notification-worthy; see
    /// [`SubscriptionTracker::observe_cache_hit`].
    pub fn cache_hit_result(&self, id: &ExpressionId) -> Option<ExpressionResult> {
        self.entries.get(id).map(|result| {
            let mut result = result.clone();
            result.from_cache = true;
            result
        })
    }
}

/// Per-subscription bookkeeping of which `(id, type_name, method_call)`
/// triples a subscriber has already been told about via a cache hit.
///
/// A subscriber that disconnects and resubscribes gets a fresh tracker: the
/// dedup window is "this session", not "ever".
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    seen: HashSet<(ExpressionId, Option<String>, Option<MethodCallInfo>)>,
}

impl SubscriptionTracker {
    /// A tracker that has seen nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a cache hit for `id` carrying `result` should be reported to
    /// this subscriber, and records it as seen if so.
    pub fn observe_cache_hit(&mut self, id: ExpressionId, result: &ExpressionResult) -> bool {
        let key = (id, result.type_name.clone(), result.method_call.clone());
        self.seen.insert(key)
    }

    /// Forget everything seen, e.g. after the underlying cache was cleared.
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_result(type_name: &str) -> ExpressionResult {
        ExpressionResult {
            type_name: Some(type_name.into()),
            method_call: None,
            profile: vec![],
            from_cache: false,
            payload: ExpressionPayload::Value(ValuePreview::new("irrelevant")),
        }
    }

    #[test]
    fn first_write_always_notifies() {
        let mut cache = ValueCache::new();
        let id = ExpressionId::new_v4();
        let event = cache.write(id, value_result("Number"));
        assert_eq!(event, Some(CacheEvent::Updated { expression_id: id, result: value_result("Number") }));
    }

    #[test]
    fn same_type_rewrite_is_quiet() {
        let mut cache = ValueCache::new();
        let id = ExpressionId::new_v4();
        cache.write(id, value_result("Number"));
        let quiet = cache.write(id, value_result("Number"));
        assert_eq!(quiet, None);
    }

    #[test]
    fn type_change_notifies() {
        let mut cache = ValueCache::new();
        let id = ExpressionId::new_v4();
        cache.write(id, value_result("Number"));
        let event = cache.write(id, value_result("Text"));
        assert!(event.is_some());
    }

    #[test]
    fn dataflow_error_always_notifies_even_if_type_unchanged() {
        let mut cache = ValueCache::new();
        let id = ExpressionId::new_v4();
        cache.write(id, value_result("Number"));
        let error_result = ExpressionResult {
            payload: ExpressionPayload::DataflowError(DataflowError { message: "boom".into(), trace: vec![] }),
            ..value_result("Number")
        };
        let event = cache.write(id, error_result);
        assert!(event.is_some());
    }

    #[test]
    fn invalidate_many_reports_only_removed_ids() {
        let mut cache = ValueCache::new();
        let present = ExpressionId::new_v4();
        let absent = ExpressionId::new_v4();
        cache.write(present, value_result("Number"));
        let removed = cache.invalidate_many(&[present, absent]);
        assert_eq!(removed, vec![present]);
    }

    #[test]
    fn subscription_tracker_dedupes_identical_cache_hits() {
        let mut tracker = SubscriptionTracker::new();
        let id = ExpressionId::new_v4();
        let result = value_result("Number");
        assert!(tracker.observe_cache_hit(id, &result));
        assert!(!tracker.observe_cache_hit(id, &result));
        let changed = value_result("Text");
        assert!(tracker.observe_cache_hit(id, &changed));
    }
}
