//! In-process document store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{matches_all, merge_record, Collection, DocumentStore, Filter, StorageError, StoredDocument};

/// Document store held in memory. Documents keep insertion order, so query
/// results come back in the order they were first written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under a freshly generated key, the way older clients
    /// created stat records before keys were made deterministic.
    pub async fn insert_with_generated_id(
        &self,
        collection: Collection,
        record: Value,
    ) -> Result<String, StorageError> {
        let id = Uuid::new_v4().simple().to_string();
        self.upsert(collection, &id, record, false).await?;
        Ok(id)
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
        merge: bool,
    ) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.data = merge_record(Some(doc.data.clone()), record, merge)?;
            }
            None => {
                let data = merge_record(None, record, merge)?;
                docs.push(StoredDocument {
                    id: id.to_string(),
                    data,
                });
            }
        }

        debug!("Upserted {}/{} (merge: {})", collection, id, merge);
        Ok(())
    }

    async fn query_equal(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StorageError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches_all(&d.data, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_same_key_keeps_one_document() {
        let store = MemoryStore::new();
        store
            .upsert(Collection::MatchStats, "m1_p1", json!({"points": 10}), false)
            .await
            .unwrap();
        store
            .upsert(Collection::MatchStats, "m1_p1", json!({"points": 10}), false)
            .await
            .unwrap();

        assert_eq!(store.count(Collection::MatchStats).await, 1);
        let doc = store.get(Collection::MatchStats, "m1_p1").await.unwrap().unwrap();
        assert_eq!(doc.data["points"], 10);
    }

    #[tokio::test]
    async fn test_merge_upsert_preserves_other_fields() {
        let store = MemoryStore::new();
        store
            .upsert(Collection::Matches, "m1", json!({"homeTeam": "t1"}), false)
            .await
            .unwrap();
        store
            .upsert(Collection::Matches, "m1", json!({"topScorerId": "p1"}), true)
            .await
            .unwrap();

        let doc = store.get(Collection::Matches, "m1").await.unwrap().unwrap();
        assert_eq!(doc.data["homeTeam"], "t1");
        assert_eq!(doc.data["topScorerId"], "p1");
    }

    #[tokio::test]
    async fn test_query_preserves_insertion_order() {
        let store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store
                .upsert(Collection::Players, id, json!({"teamId": "t1"}), false)
                .await
                .unwrap();
        }
        store
            .upsert(Collection::Players, "d", json!({"teamId": "t2"}), false)
            .await
            .unwrap();

        let docs = store
            .query_equal(Collection::Players, &[Filter::field_eq("teamId", "t1")])
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store
            .insert_with_generated_id(Collection::MatchStats, json!({"points": 1}))
            .await
            .unwrap();
        let b = store
            .insert_with_generated_id(Collection::MatchStats, json!({"points": 1}))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count(Collection::MatchStats).await, 2);
    }

    #[tokio::test]
    async fn test_query_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store.query_equal(Collection::Teams, &[]).await.unwrap();
        assert!(docs.is_empty());
        assert!(store.get(Collection::Teams, "x").await.unwrap().is_none());
    }
}
