use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{AppError, Result};

/// User-facing save of a finished blob.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, bytes: &[u8], filename: &str) -> Result<()>;
}

/// Saves blobs into a downloads directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        DirectorySink {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, bytes: &[u8], filename: &str) -> Result<()> {
        // Only the final component is honoured.
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| AppError::DownloadError(format!("invalid filename {:?}", filename)))?;
        let target = self.dir.join(name);
        let partial = self.dir.join(format!("{}.part", name.to_string_lossy()));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::DownloadError(format!("cannot create {}: {}", self.dir.display(), e)))?;
        tokio::fs::write(&partial, bytes)
            .await
            .map_err(|e| AppError::DownloadError(format!("cannot write {}: {}", partial.display(), e)))?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            error!("Failed to finalize download {}: {}", target.display(), e);
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(AppError::DownloadError(format!("cannot save {}: {}", target.display(), e)));
        }

        info!(path = %target.display(), bytes = bytes.len(), "download saved");
        Ok(())
    }
}

/// Discards everything; for callers that hand the blob back themselves.
#[derive(Debug, Default, Clone)]
pub struct NullSink;

#[async_trait]
impl DownloadSink for NullSink {
    async fn deliver(&self, _bytes: &[u8], _filename: &str) -> Result<()> {
        Ok(())
    }
}
