use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{validate_collection, Store, StoreError};
use crate::ingest::types::ClassifiedPost;

/// In-process store; used by tests and local runs without a data directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, Vec<ClassifiedPost>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all collections.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|m| m.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Io(std::io::Error::other("memory store mutex poisoned"))
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn insert(&self, collection: &str, record: &ClassifiedPost) -> Result<(), StoreError> {
        validate_collection(collection)?;
        let mut g = self.inner.lock().map_err(|_| poisoned())?;
        g.entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_collections(&self) -> Result<BTreeSet<String>, StoreError> {
        let g = self.inner.lock().map_err(|_| poisoned())?;
        Ok(g.keys().cloned().collect())
    }

    async fn query(&self, collection: &str) -> Result<Vec<ClassifiedPost>, StoreError> {
        validate_collection(collection)?;
        let g = self.inner.lock().map_err(|_| poisoned())?;
        g.get(collection)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(collection.to_string()))
    }
}
