// src/store/mod.rs
//! Durable append-only record store, one named collection per capture target.

pub mod jsonl;
pub mod memory;

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::ClassifiedPost;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid collection name {0:?}")]
    InvalidCollection(String),

    #[error("collection {0:?} not found")]
    NotFound(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, collection: &str, record: &ClassifiedPost) -> Result<(), StoreError>;
    async fn list_collections(&self) -> Result<BTreeSet<String>, StoreError>;
    /// Records in insertion order.
    async fn query(&self, collection: &str) -> Result<Vec<ClassifiedPost>, StoreError>;
}

pub type SharedStore = Arc<dyn Store>;

/// Collection names double as file stems: ASCII letters, digits, `_` and `-` only.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("collection regex"));
    if re.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_like_names() {
        assert!(validate_collection("fed_2025-q3").is_ok());
        assert!(validate_collection("../etc").is_err());
        assert!(validate_collection("a b").is_err());
        assert!(validate_collection("").is_err());
    }
}
