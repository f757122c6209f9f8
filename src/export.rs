//! Packages every stored capture into one zip archive.
//!
//! The archive is built fresh on every request and never persisted. Export
//! only reads the capture store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::captures::{Capture, CaptureStore};
use crate::download::DownloadSink;
use crate::error::{AppError, Result};
use crate::extract::timestamp_label;

/// A finished archive and the name it should be saved under.
#[derive(Debug, Clone)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub entries: usize,
}

pub struct ArchiveExporter {
    store: Arc<CaptureStore>,
}

impl ArchiveExporter {
    pub fn new(store: Arc<CaptureStore>) -> Self {
        ArchiveExporter { store }
    }

    pub async fn export_all(&self) -> Result<Archive> {
        self.export_at(Utc::now()).await
    }

    /// Exports and hands the archive to `sink`. Nothing is delivered when
    /// the store is empty.
    pub async fn export_to(&self, sink: &dyn DownloadSink) -> Result<Archive> {
        let archive = self.export_all().await?;
        sink.deliver(&archive.bytes, &archive.filename).await?;
        Ok(archive)
    }

    async fn export_at(&self, at: DateTime<Utc>) -> Result<Archive> {
        let captures = self.store.list().await?;
        if captures.is_empty() {
            return Err(AppError::EmptyExportError);
        }

        let (bytes, entries) = build_zip(&captures)?;
        let filename = archive_filename(at);
        info!(filename = %filename, captures = captures.len(), entries, "archive built");

        Ok(Archive { bytes, filename, entries })
    }
}

pub fn archive_filename(at: DateTime<Utc>) -> String {
    format!("captures_{}.zip", timestamp_label(at))
}

/// One entry per distinct filename. A repeated filename keeps the slot of
/// its first occurrence and the content of its last.
fn build_zip(captures: &[Capture]) -> Result<(Vec<u8>, usize)> {
    let mut order: Vec<(&str, &str)> = Vec::with_capacity(captures.len());
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for capture in captures {
        match slots.get(capture.filename.as_str()) {
            Some(&slot) => order[slot].1 = capture.content.as_str(),
            None => {
                slots.insert(capture.filename.as_str(), order.len());
                order.push((capture.filename.as_str(), capture.content.as_str()));
            }
        }
    }

    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default();
        for (name, content) in &order {
            zip.start_file(*name, options)?;
            zip.write_all(content.as_bytes())
                .map_err(|e| AppError::StorageError(format!("archive entry {}: {}", name, e)))?;
        }
        zip.finish()?;
    }
    Ok((buf, order.len()))
}
