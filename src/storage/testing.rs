//! Failure-injecting store wrapper for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Collection, DocumentStore, Filter, MemoryStore, StorageError, StoredDocument};

/// Wraps a [`MemoryStore`], failing selected writes and reads.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    // document key -> remaining failures
    write_failures: Mutex<HashMap<String, u32>>,
    // filter value that makes a query fail
    read_failures: Mutex<HashSet<String>>,
    upsert_calls: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` upserts to `id`.
    pub fn fail_writes(&self, id: &str, times: u32) {
        self.write_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), times);
    }

    /// Fail every query that filters on `value`.
    pub fn fail_reads_matching(&self, value: &str) {
        self.read_failures.lock().unwrap().insert(value.to_string());
    }

    /// Keys of every attempted upsert, in call order.
    pub fn upsert_calls(&self) -> Vec<String> {
        self.upsert_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
        merge: bool,
    ) -> Result<(), StorageError> {
        self.upsert_calls.lock().unwrap().push(id.to_string());
        let should_fail = {
            let mut failures = self.write_failures.lock().unwrap();
            match failures.get_mut(id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(StorageError::Unavailable(format!("write to {} rejected", id)));
        }
        self.inner.upsert(collection, id, record, merge).await
    }

    async fn query_equal(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StorageError> {
        let should_fail = {
            let failures = self.read_failures.lock().unwrap();
            filters
                .iter()
                .any(|f| f.value.as_str().is_some_and(|v| failures.contains(v)))
        };
        if should_fail {
            return Err(StorageError::Unavailable("query rejected".to_string()));
        }
        self.inner.query_equal(collection, filters).await
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        self.inner.get(collection, id).await
    }
}
