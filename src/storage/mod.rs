//! Document store access.
//!
//! The pipeline talks to a remote document store through [`DocumentStore`]:
//! equality-filtered queries and upserts keyed by document id. Two
//! implementations ship with the crate:
//! - [`MemoryStore`]: in-process, used by tests and embedders
//! - [`JsonlStore`]: one JSONL file per collection under the data directory
//!
//! [`StatStore`] is the typed adapter the pipeline uses; loose documents are
//! validated into [`crate::models::StatEntry`] / [`crate::models::SeasonAggregate`]
//! only there.

mod jsonl;
mod memory;
mod stats;
#[cfg(test)]
pub(crate) mod testing;

pub use jsonl::*;
pub use memory::*;
pub use stats::*;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record must be a JSON object: {0}")]
    NotAnObject(String),

    #[error("Invalid document {id} in {collection}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.data_dir.join("collections")
    }

    pub fn collection_path(&self, collection: Collection) -> PathBuf {
        self.collections_dir().join(collection.filename())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Collections the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Per-match stat entries
    MatchStats,
    /// Per-league season aggregates
    SeasonStats,
    Matches,
    Players,
    Teams,
    Leagues,
}

impl Collection {
    /// Collection name in the document store.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::MatchStats => "matchStats",
            Collection::SeasonStats => "seasonStats",
            Collection::Matches => "matches",
            Collection::Players => "players",
            Collection::Teams => "teams",
            Collection::Leagues => "leagues",
        }
    }

    /// Get the filename for this collection in a file-backed store.
    pub fn filename(&self) -> String {
        format!("{}.jsonl", self.name())
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Equality predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

/// A document as held by the store: its key plus an untyped body.
///
/// The key is the store's own id and is independent of any `id`-like field
/// inside `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub data: Map<String, Value>,
}

/// The external document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store identifier for logging.
    fn name(&self) -> &'static str;

    /// Write `record` under `id`. With `merge`, fields already stored under
    /// that id and absent from `record` survive; without it the document is
    /// replaced.
    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
        merge: bool,
    ) -> Result<(), StorageError>;

    /// All documents matching every filter (logical AND), in store order.
    async fn query_equal(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StorageError>;

    /// Fetch a single document by key.
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError>;
}

/// Apply upsert semantics to an optional existing body.
pub(crate) fn merge_record(
    existing: Option<Map<String, Value>>,
    record: Value,
    merge: bool,
) -> Result<Map<String, Value>, StorageError> {
    let incoming = match record {
        Value::Object(map) => map,
        other => return Err(StorageError::NotAnObject(other.to_string())),
    };

    match existing {
        Some(mut current) if merge => {
            for (key, value) in incoming {
                current.insert(key, value);
            }
            Ok(current)
        }
        _ => Ok(incoming),
    }
}

pub(crate) fn matches_all(data: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(data))
}
