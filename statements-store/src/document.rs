use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// A file as listed by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Store-wide id, stable across listings.
    pub id: String,
    pub name: String,
    pub folder: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Where statements, the inventory and parse tracking live.
///
/// Folders are `/`-separated paths relative to the store root. Listing a
/// folder that does not exist yields no files.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, folder: &str) -> Result<Vec<StoredFile>>;
    async fn read(&self, id: &str) -> Result<Vec<u8>>;
    async fn write(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<StoredFile>;
    /// A local path holding the file's bytes, for tools that need one.
    async fn materialize(&self, id: &str) -> Result<PathBuf>;

    async fn read_in(&self, folder: &str, name: &str) -> Result<Vec<u8>> {
        self.read(&join_id(folder, name)).await
    }
}

pub fn join_id(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}
