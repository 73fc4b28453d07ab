//! File-backed store: `<data_dir>/<collection>.jsonl`, one record per line,
//! append-only.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{validate_collection, Store, StoreError};
use crate::ingest::types::ClassifiedPost;

const EXT: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.{EXT}"))
    }
}

#[async_trait::async_trait]
impl Store for JsonlStore {
    async fn insert(&self, collection: &str, record: &ClassifiedPost) -> Result<(), StoreError> {
        validate_collection(collection)?;
        fs::create_dir_all(&self.dir).await?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(collection))
            .await?;
        f.write_all(&line).await?;
        f.flush().await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut out = BTreeSet::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_collection(stem).is_ok() {
                    out.insert(stem.to_string());
                }
            }
        }
        Ok(out)
    }

    async fn query(&self, collection: &str) -> Result<Vec<ClassifiedPost>, StoreError> {
        validate_collection(collection)?;
        let content = match fs::read_to_string(self.path_for(collection)).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(collection.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ClassifiedPost>(line) {
                Ok(rec) => out.push(rec),
                // A concurrent append may leave a partial tail line.
                Err(e) => tracing::warn!(target: "store", collection, line = i + 1, error = %e, "skipping unreadable record"),
            }
        }
        Ok(out)
    }
}
