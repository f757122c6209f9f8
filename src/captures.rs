use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::storage::KeyValueStore;

/// Storage key holding the whole capture sequence.
pub const CAPTURES_KEY: &str = "captures";

/// One saved snapshot plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub filename: String,
    pub content: String,
    pub source_url: String,
    pub source_title: String,
    pub captured_at: DateTime<Utc>,
}

/// Ordered, persisted collection of captures.
///
/// The sequence lives under a single key and is always read and written
/// whole. Mutations queue on `write_lock` so a read-modify-write never
/// interleaves with another one.
pub struct CaptureStore {
    storage: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl CaptureStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        CaptureStore {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(
        &self,
        filename: &str,
        content: &str,
        source_url: &str,
        source_title: &str,
    ) -> Result<Capture> {
        if content.is_empty() {
            return Err(AppError::ExtractionError(format!("refusing to store empty capture {}", filename)));
        }

        let _guard = self.write_lock.lock().await;
        let mut captures = self.read().await?;
        let capture = Capture {
            filename: filename.to_string(),
            content: content.to_string(),
            source_url: source_url.to_string(),
            source_title: source_title.to_string(),
            captured_at: Utc::now(),
        };
        captures.push(capture.clone());
        self.write(&captures).await?;

        info!(filename = %capture.filename, total = captures.len(), "capture stored");
        Ok(capture)
    }

    pub async fn list(&self) -> Result<Vec<Capture>> {
        self.read().await
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(&[]).await?;
        info!("capture store cleared");
        Ok(())
    }

    async fn read(&self) -> Result<Vec<Capture>> {
        match self.storage.get(CAPTURES_KEY).await? {
            None => Ok(Vec::new()),
            Some(value) => {
                let captures: Vec<Capture> = serde_json::from_value(value).map_err(|e| {
                    AppError::StorageError(format!("stored captures are unreadable: {}", e))
                })?;
                debug!(count = captures.len(), "captures loaded");
                Ok(captures)
            }
        }
    }

    async fn write(&self, captures: &[Capture]) -> Result<()> {
        let value: Value = serde_json::to_value(captures)?;
        self.storage.set(CAPTURES_KEY, value).await
    }
}
