#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;

use crate::{constants::CACHE_KEY_PREFIX, grading::GradeMap};

/// A flat string key-value store with enumerable keys: the moral equivalent
/// of browser local storage, injected so the aggregation logic is
/// storage-agnostic and testable with an in-memory fake.
///
/// Reads and writes are synchronous; no method suspends.
pub trait KeyValueStore {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any prior value.
    fn set(&mut self, key: &str, value: &str);

    /// Removes `key` and its value, if present.
    fn remove(&mut self, key: &str);

    /// Enumerates every key currently stored. The order is the store's
    /// enumeration order and is what group-scoped cache merging follows.
    fn keys(&self) -> Vec<String>;
}

/// In-memory [`KeyValueStore`] with deterministic (sorted) key enumeration.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Backing entries.
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Builds the cache key for a grading scope. Every call site goes through
/// this one builder so key naming cannot drift.
pub fn scope_key(course_id: u64, assignment_id: u64, group_id: Option<u64>) -> String {
    match group_id {
        Some(group_id) => {
            format!("{CACHE_KEY_PREFIX}_{course_id}_{assignment_id}_{group_id}")
        }
        None => format!("{CACHE_KEY_PREFIX}_{course_id}_{assignment_id}"),
    }
}

/// Reads and parses one cache blob. A missing or malformed blob degrades to
/// "no cached grades" with a warning; cache corruption is never fatal.
fn parse_blob(store: &impl KeyValueStore, key: &str) -> GradeMap {
    let Some(blob) = store.get(key) else {
        return GradeMap::new();
    };

    match serde_json::from_str(&blob) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(key, "discarding corrupt grading cache: {e}");
            GradeMap::new()
        }
    }
}

/// Copies entries from `source` into `merged` for submission ids not yet
/// present. Earlier sources always win.
fn fill_unseen(merged: &mut GradeMap, source: GradeMap) {
    for (submission_id, graded) in source {
        merged.entry(submission_id).or_insert(graded);
    }
}

/// Reconstructs the best-known local edit state for one
/// `(course, assignment)` scope from whatever has been persisted.
///
/// Precedence, first match per submission id wins:
/// 1. the exact-scope key `offlineGradingCache_<course>_<assignment>`;
/// 2. when that is absent or empty, the legacy unscoped
///    `offlineGradingCache` key;
/// 3. group-scoped sub-caches (`offlineGradingCache_<course>_<assignment>_*`),
///    merged in store-enumeration order, filling remaining unseen ids.
pub fn aggregate_local_grades(
    store: &impl KeyValueStore,
    course_id: u64,
    assignment_id: u64,
) -> GradeMap {
    let scoped_key = scope_key(course_id, assignment_id, None);
    let mut merged = parse_blob(store, &scoped_key);

    if merged.is_empty() {
        fill_unseen(&mut merged, parse_blob(store, CACHE_KEY_PREFIX));
    }

    let group_prefix = format!("{scoped_key}_");
    for key in store.keys() {
        if key.starts_with(&group_prefix) {
            fill_unseen(&mut merged, parse_blob(store, &key));
        }
    }

    merged
}
