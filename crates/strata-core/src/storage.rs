//! Snapshot storage backends.
//!
//! A store holds one object per calendar day, named like `2024-01-01.parquet`.
//! The contract is deliberately small: read a whole object, replace it
//! atomically, remove it, list what exists. There is no partial write — a
//! failed `replace` must leave the prior object untouched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{Error, Result};

/// Storage seam for per-day snapshot objects.
///
/// Implementations must make `replace` all-or-nothing: either the object
/// holds the new payload in full, or the prior payload (or absence) survives.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// Reads the named object in full, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the object exists but cannot be read. Absence is
    /// not an error.
    async fn get(&self, name: &str) -> Result<Option<Bytes>>;

    /// Atomically replaces the named object with `data`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the prior object is left intact.
    async fn replace(&self, name: &str, data: Bytes) -> Result<()>;

    /// Removes the named object. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing object could not be removed.
    async fn remove(&self, name: &str) -> Result<bool>;

    /// Lists object names currently in the store, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Local-filesystem store rooted at one data directory.
///
/// Replacement is write-then-rename: the payload goes to a hidden sibling
/// temp file first and is renamed over the target, so readers (and crashes)
/// never observe a truncated snapshot.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Opens the store, creating the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::Storage {
                message: format!("failed to create data directory '{}': {e}", root.display()),
            })?;
        Ok(Self { root })
    }

    /// Directory this store reads and writes.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl SnapshotStore for LocalStore {
    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        let path = self.path_of(name);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage {
                message: format!("failed to read '{}': {e}", path.display()),
            }),
        }
    }

    async fn replace(&self, name: &str, data: Bytes) -> Result<()> {
        let path = self.path_of(name);
        let tmp = self.root.join(format!(".{name}.tmp"));

        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage {
                message: format!("failed to stage '{}': {e}", tmp.display()),
            });
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage {
                message: format!("failed to replace '{}': {e}", path.display()),
            });
        }
        debug!(object = name, bytes = data.len(), "replaced snapshot object");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(object = name, "removed snapshot object");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage {
                message: format!("failed to remove '{}': {e}", path.display()),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::Storage {
                message: format!("failed to list '{}': {e}", self.root.display()),
            })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::Storage {
            message: format!("failed to list '{}': {e}", self.root.display()),
        })? {
            let is_file = entry.file_type().await.map_or(false, |t| t.is_file());
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // Skip staged temp files left by an interrupted replace.
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory store for tests.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        let objects = self.objects.read().map_err(|_| Error::Storage {
            message: "lock poisoned".to_string(),
        })?;
        Ok(objects.get(name).cloned())
    }

    async fn replace(&self, name: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Storage {
            message: "lock poisoned".to_string(),
        })?;
        objects.insert(name.to_string(), data);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        let mut objects = self.objects.write().map_err(|_| Error::Storage {
            message: "lock poisoned".to_string(),
        })?;
        Ok(objects.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| Error::Storage {
            message: "lock poisoned".to_string(),
        })?;
        let mut names: Vec<String> = objects.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("2024-01-01.parquet").await.unwrap(), None);

        store
            .replace("2024-01-01.parquet", Bytes::from("payload"))
            .await
            .expect("replace should succeed");
        assert_eq!(
            store.get("2024-01-01.parquet").await.unwrap(),
            Some(Bytes::from("payload"))
        );

        assert!(store.remove("2024-01-01.parquet").await.unwrap());
        assert!(!store.remove("2024-01-01.parquet").await.unwrap());
    }

    #[tokio::test]
    async fn local_store_get_absent_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path()).await.expect("open");
        assert_eq!(store.get("2024-01-01.parquet").await.unwrap(), None);
    }

    #[tokio::test]
    async fn local_store_replace_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path()).await.expect("open");

        store
            .replace("2024-01-01.parquet", Bytes::from("first"))
            .await
            .expect("replace");
        store
            .replace("2024-01-01.parquet", Bytes::from("second"))
            .await
            .expect("replace again");

        assert_eq!(
            store.get("2024-01-01.parquet").await.unwrap(),
            Some(Bytes::from("second"))
        );
        // No staged temp file survives a successful replace.
        assert_eq!(store.list().await.unwrap(), vec!["2024-01-01.parquet"]);
    }

    #[tokio::test]
    async fn local_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path()).await.expect("open");

        store
            .replace("2024-01-01.parquet", Bytes::from("x"))
            .await
            .expect("replace");
        assert!(store.remove("2024-01-01.parquet").await.unwrap());
        assert!(!store.remove("2024-01-01.parquet").await.unwrap());
        assert!(!dir.path().join("2024-01-01.parquet").exists());
    }

    #[tokio::test]
    async fn local_store_list_skips_hidden_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open(dir.path()).await.expect("open");

        store
            .replace("2024-01-02.parquet", Bytes::from("b"))
            .await
            .expect("replace");
        store
            .replace("2024-01-01.parquet", Bytes::from("a"))
            .await
            .expect("replace");
        std::fs::write(dir.path().join(".stray.tmp"), b"junk").expect("write stray");

        assert_eq!(
            store.list().await.unwrap(),
            vec!["2024-01-01.parquet", "2024-01-02.parquet"]
        );
    }
}
