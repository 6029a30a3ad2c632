//! JSONL (JSON Lines) document store.
//!
//! Each collection lives in one file; each line is a [`StoredDocument`].
//! Upserts rewrite the whole file, which is fine at roster scale.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    matches_all, merge_record, Collection, DocumentStore, Filter, StorageConfig, StorageError,
    StoredDocument,
};

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Write entities, replacing the entire file.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        // Sibling temp file, renamed into place.
        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote {} entities to {:?}", count, self.path);

        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read all entities from the file. Unparseable lines are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", idx + 1, self.path, e);
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// File-backed document store rooted at the configured data directory.
pub struct JsonlStore {
    config: StorageConfig,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(config: StorageConfig) -> Self {
        info!("Opening JSONL store at {:?}", config.collections_dir());
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    fn read_collection(path: PathBuf) -> Result<Vec<StoredDocument>, StorageError> {
        JsonlReader::new(path).read_all()
    }
}

/// Run file work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StorageError::Unavailable(format!("file task failed: {}", e)))?
}

#[async_trait]
impl DocumentStore for JsonlStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
        merge: bool,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let path = self.config.collection_path(collection);
        let key = id.to_string();
        blocking(move || {
            let mut docs = Self::read_collection(path.clone())?;
            match docs.iter_mut().find(|d| d.id == key) {
                Some(doc) => {
                    doc.data = merge_record(Some(doc.data.clone()), record, merge)?;
                }
                None => docs.push(StoredDocument {
                    id: key,
                    data: merge_record(None, record, merge)?,
                }),
            }
            JsonlWriter::new(path).write_all(&docs)?;
            Ok(())
        })
        .await?;

        debug!("Upserted {}/{} (merge: {})", collection, id, merge);
        Ok(())
    }

    async fn query_equal(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.config.collection_path(collection);
        let docs = blocking(move || Self::read_collection(path)).await?;
        Ok(docs
            .into_iter()
            .filter(|d| matches_all(&d.data, filters))
            .collect())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.config.collection_path(collection);
        let docs = blocking(move || Self::read_collection(path)).await?;
        Ok(docs.into_iter().find(|d| d.id == id))
    }
}
