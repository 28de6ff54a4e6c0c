//! Remote Progress Store
//!
//! The async key-value contract the sync bridge writes through, plus an
//! in-memory implementation. Paths are slash separated
//! (`users/{userId}/quests/{questId}`); a `get` on a collection path returns
//! an object holding its direct children.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Port for the remote progress mirror
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Read a record, or the children of a collection path
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Merge the given fields into the record at `path`, creating it if needed
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Delete a record
    async fn remove(&self, path: &str) -> Result<(), StoreError>;
}

/// Collect direct children of `path` from `(path, fields)` pairs
pub(crate) fn children_of<'a>(
    path: &str,
    entries: impl Iterator<Item = (&'a str, &'a Map<String, Value>)>,
) -> Option<Value> {
    let prefix = format!("{}/", path.trim_end_matches('/'));
    let children: Map<String, Value> = entries
        .filter_map(|(key, fields)| {
            let child = key.strip_prefix(&prefix)?;
            (!child.is_empty() && !child.contains('/'))
                .then(|| (child.to_string(), Value::Object(fields.clone())))
        })
        .collect();
    (!children.is_empty()).then_some(Value::Object(children))
}

/// Process-local store, used by tests and offline sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current fields at a path, for inspection
    pub fn fields(&self, path: &str) -> Option<Map<String, Value>> {
        self.records.get(path).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if let Some(entry) = self.records.get(path) {
            return Ok(Some(Value::Object(entry.value().clone())));
        }
        let snapshot: Vec<(String, Map<String, Value>)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Ok(children_of(
            path,
            snapshot.iter().map(|(key, fields)| (key.as_str(), fields)),
        ))
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut entry = self.records.entry(path.to_string()).or_default();
        entry.extend(fields);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.records.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let path = "users/u1/quests/q1";

        store
            .update(path, fields(json!({"state": "accepted", "progress": 0})))
            .await
            .unwrap();
        store
            .update(path, fields(json!({"state": "canceled"})))
            .await
            .unwrap();

        let record = store.get(path).await.unwrap().unwrap();
        assert_eq!(record, json!({"state": "canceled", "progress": 0}));
    }

    #[tokio::test]
    async fn test_collection_get_lists_direct_children() {
        let store = MemoryStore::new();
        store
            .update("users/u1/quests/a", fields(json!({"progress": 1})))
            .await
            .unwrap();
        store
            .update("users/u1/quests/b", fields(json!({"progress": 2})))
            .await
            .unwrap();
        store
            .update("users/u2/quests/c", fields(json!({"progress": 3})))
            .await
            .unwrap();

        let quests = store.get("users/u1/quests").await.unwrap().unwrap();
        assert_eq!(quests, json!({"a": {"progress": 1}, "b": {"progress": 2}}));
        assert!(store.get("users/u3/quests").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();
        store
            .update("users/u1/quests/a", fields(json!({"progress": 1})))
            .await
            .unwrap();
        store.remove("users/u1/quests/a").await.unwrap();
        assert!(store.is_empty());
        assert!(store.get("users/u1/quests/a").await.unwrap().is_none());
    }
}
