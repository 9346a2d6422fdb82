//! Persisted key-value storage backends.
//!
//! # Design
//! `SecureStorage` mirrors a mobile secure-store API: string keys, string
//! values, and a delete that succeeds when the key is already gone. The trait
//! is object safe so the credential store can hold an `Arc<dyn SecureStorage>`
//! supplied by the host platform.
//!
//! `FileStorage` keeps one file per key. Writes go to a temp file in the same
//! directory that is then renamed over the target, so a reader only ever sees
//! the old or the new value. File I/O goes through `tokio::fs` so callers on
//! the runtime are never blocked on the disk.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::ApiError;

#[async_trait]
pub trait SecureStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;
    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ApiError>;
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Filesystem-backed storage, one file per key under `base`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    base: PathBuf,
}

impl FileStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, ApiError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(ApiError::Storage(format!("invalid key {key:?}")));
        }
        Ok(self.base.join(key))
    }
}

fn storage_err(e: std::io::Error) -> ApiError {
    ApiError::Storage(e.to_string())
}

#[async_trait]
impl SecureStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        match fs::read_to_string(self.key_path(key)?).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let path = self.key_path(key)?;
        fs::create_dir_all(&self.base).await.map_err(storage_err)?;
        let tmp = self.base.join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, value).await.map_err(storage_err)?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(storage_err(e));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        match fs::remove_file(self.key_path(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_roundtrip_and_idempotent_delete() {
        let store = MemoryStorage::new();
        assert_eq!(store.get("authToken").await.unwrap(), None);

        store.set("authToken", "t1").await.unwrap();
        assert_eq!(store.get("authToken").await.unwrap().as_deref(), Some("t1"));

        store.delete("authToken").await.unwrap();
        store.delete("authToken").await.unwrap();
        assert_eq!(store.get("authToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").await.unwrap();
        assert_eq!(b.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn file_roundtrip_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path().join("secure"));
        store.set("userInfo", r#"{"email":"a@b.com"}"#).await.unwrap();

        let reopened = FileStorage::new(dir.path().join("secure"));
        assert_eq!(
            reopened.get("userInfo").await.unwrap().as_deref(),
            Some(r#"{"email":"a@b.com"}"#)
        );

        reopened.delete("userInfo").await.unwrap();
        reopened.delete("userInfo").await.unwrap();
        assert_eq!(store.get("userInfo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        store.set("authToken", "one").await.unwrap();
        store.set("authToken", "two").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["authToken"]);
        assert_eq!(store.get("authToken").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_file_writes_on_single_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let writers = (0..8).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.set(&format!("key{i}"), &i.to_string()).await })
        });
        for writer in writers.collect::<Vec<_>>() {
            writer.await.unwrap().unwrap();
        }
        for i in 0..8 {
            let value = store.get(&format!("key{i}")).await.unwrap();
            assert_eq!(value, Some(i.to_string()));
        }
    }

    #[tokio::test]
    async fn file_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x").await,
            Err(ApiError::Storage(_))
        ));
        assert!(matches!(store.get("").await, Err(ApiError::Storage(_))));
    }
}
