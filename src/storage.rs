//! Key-value persistence underneath the capture store.
//!
//! Each key holds one JSON blob and is read and written wholesale. A write
//! either fully replaces the previous blob or leaves it untouched.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{AppError, Result};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Removes every listed key. Missing keys are ignored.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}

/// In-process store, used by tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::StorageError("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.lock()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Directory-backed store: one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub async fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_path).await.map_err(|e| {
            error!("Failed to create storage dir {}: {}", base_path.display(), e);
            AppError::StorageError(format!("cannot create {}: {}", base_path.display(), e))
        })?;
        info!("FileStore initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AppError::StorageError(format!("invalid storage key {:?}", key)));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return Err(AppError::StorageError(format!("cannot read {}: {}", key, e)));
            }
        };
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::StorageError(format!("corrupt blob under {}: {}", key, e)))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(&value)?;

        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            error!("Failed to write {}: {}", tmp.display(), e);
            AppError::StorageError(format!("cannot write {}: {}", key, e))
        })?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            error!("Failed to replace {}: {}", path.display(), e);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::StorageError(format!("cannot write {}: {}", key, e)));
        }
        debug!("Stored {} bytes under {}", bytes.len(), key);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", key),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!("Failed to remove {}: {}", path.display(), e);
                    return Err(AppError::StorageError(format!("cannot remove {}: {}", key, e)));
                }
            }
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.base_path).await.map_err(|e| {
            AppError::StorageError(format!("cannot list {}: {}", self.base_path.display(), e))
        })?;
        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| AppError::StorageError(format!("cannot list storage: {}", e)))?
        {
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
