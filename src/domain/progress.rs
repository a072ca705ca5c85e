//! Per-entity progress map with last-write-wins semantics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest known status payload for one task or workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEntry {
    /// Payload exactly as the server sent it.
    pub data: serde_json::Value,
    /// When the payload was applied locally.
    pub updated_at: DateTime<Utc>,
}

/// Maps an entity id to its latest [`ProgressEntry`].
///
/// A later update for the same key replaces the earlier payload wholesale;
/// fields are never merged.
#[derive(Debug, Clone, Default)]
pub struct ProgressMap {
    entries: HashMap<String, ProgressEntry>,
}

impl ProgressMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` for `id`, returning the replaced entry if any.
    pub fn upsert(&mut self, id: impl Into<String>, data: serde_json::Value) -> Option<ProgressEntry> {
        self.entries.insert(
            id.into(),
            ProgressEntry {
                data,
                updated_at: Utc::now(),
            },
        )
    }

    /// Returns the latest entry for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ProgressEntry> {
        self.entries.get(id)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an owned copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ProgressEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_write_wins_without_merge() {
        let mut map = ProgressMap::new();
        map.upsert("T1", json!({"progress": 10, "stage": "align"}));
        let previous = map.upsert("T1", json!({"status": "running"}));

        assert!(previous.is_some());
        assert_eq!(map.len(), 1);
        let entry = map.get("T1").map(|e| e.data.clone());
        assert_eq!(entry, Some(json!({"status": "running"})));
    }

    #[test]
    fn keys_are_independent() {
        let mut map = ProgressMap::new();
        map.upsert("a", json!(1));
        map.upsert("b", json!(2));
        assert_eq!(map.get("a").map(|e| &e.data), Some(&json!(1)));
        assert_eq!(map.get("b").map(|e| &e.data), Some(&json!(2)));
        assert!(map.get("c").is_none());
        assert_eq!(map.snapshot().len(), 2);
    }
}
