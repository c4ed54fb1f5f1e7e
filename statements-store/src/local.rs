//! Directory-tree document store. File ids are paths relative to the root.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::document::{join_id, DocumentStore, StoredFile};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative id under the root; anything escaping it is refused.
    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel.trim_matches('/'));
        for component in rel_path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StoreError::InvalidPath(rel.to_string())),
            }
        }
        Ok(self.root.join(rel_path))
    }

    async fn stored_file(&self, folder: &str, name: &str, path: &Path) -> Result<StoredFile> {
        let meta = fs::metadata(path).await?;
        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(StoredFile {
            id: join_id(folder, name),
            name: name.to_string(),
            folder: folder.trim_matches('/').to_string(),
            size: meta.len(),
            last_modified,
        })
    }
}

fn not_found(id: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(id.to_string())
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn list(&self, folder: &str) -> Result<Vec<StoredFile>> {
        let dir = self.resolve(folder)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 filename");
                continue;
            };
            files.push(self.stored_file(folder, &name, &entry.path()).await?);
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(id)?;
        fs::read(&path).await.map_err(|e| not_found(id, e))
    }

    async fn write(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<StoredFile> {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(StoreError::InvalidPath(name.to_string()));
        }
        let dir = self.resolve(folder)?;
        fs::create_dir_all(&dir).await?;
        let path = dir.join(name);
        fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "stored file");
        self.stored_file(folder, name, &path).await
    }

    async fn materialize(&self, id: &str) -> Result<PathBuf> {
        let path = self.resolve(id)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(path),
            Err(e) => Err(not_found(id, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_list_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let f = store
            .write("STP IP", "ec-646990403000000003-202501.xlsx", b"xlsx bytes")
            .await
            .unwrap();
        assert_eq!(f.id, "STP IP/ec-646990403000000003-202501.xlsx");
        assert_eq!(f.size, 10);

        let listed = store.list("STP IP").await.unwrap();
        assert_eq!(listed, vec![f.clone()]);
        assert_eq!(store.read(&f.id).await.unwrap(), b"xlsx bytes");
        let path = store.materialize(&f.id).await.unwrap();
        assert!(path.ends_with("ec-646990403000000003-202501.xlsx"));
    }

    #[tokio::test]
    async fn missing_folder_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.list("nope/deeper").await.unwrap().is_empty());
        assert!(matches!(store.read("nope/x.pdf").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn refuses_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(store.read("../etc/passwd").await, Err(StoreError::InvalidPath(_))));
        assert!(matches!(
            store.write("ok", "../x.pdf", b"").await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn subfolders_are_not_listed_as_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.write("a/b", "inner.pdf", b"1").await.unwrap();
        store.write("a", "outer.pdf", b"2").await.unwrap();
        let names: Vec<_> = store.list("a").await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["outer.pdf"]);
    }
}
