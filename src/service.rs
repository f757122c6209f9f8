//! Operations exposed to the popup, composed from the core components.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::captures::{Capture, CaptureStore};
use crate::document::{DocumentLoader, DocumentRequest};
use crate::download::DownloadSink;
use crate::error::{AppError, Result};
use crate::export::{Archive, ArchiveExporter};
use crate::extract::{capture_filename, scraper_filename, serialize_document};
use crate::registry::{ScraperRegistry, ScraperSummary};
use crate::scrapers::StructuredResult;

/// Direct saves go straight to the download sink; batch saves go to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    #[default]
    Direct,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SaveOutcome {
    Direct { content: String, filename: String },
    Stored { stored: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScraperRun {
    pub result: StructuredResult,
    pub filename: String,
    pub stored: bool,
}

pub struct CaptureService {
    registry: Arc<ScraperRegistry>,
    store: Arc<CaptureStore>,
    exporter: ArchiveExporter,
    sink: Arc<dyn DownloadSink>,
    loader: Arc<dyn DocumentLoader>,
}

impl CaptureService {
    pub fn new(
        registry: Arc<ScraperRegistry>,
        store: Arc<CaptureStore>,
        sink: Arc<dyn DownloadSink>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        CaptureService {
            exporter: ArchiveExporter::new(Arc::clone(&store)),
            registry,
            store,
            sink,
            loader,
        }
    }

    pub async fn save_capture(&self, mode: SaveMode, request: DocumentRequest) -> Result<SaveOutcome> {
        let doc = self.loader.load(request).await?;
        let serialized = serialize_document(&doc)?;
        let filename = capture_filename(&doc.url, serialized.extension, Utc::now());

        self.route(mode, &filename, &serialized.content, &doc.url, &doc.title).await?;
        Ok(match mode {
            SaveMode::Direct => SaveOutcome::Direct {
                content: serialized.content,
                filename,
            },
            SaveMode::Batch => SaveOutcome::Stored { stored: true },
        })
    }

    pub async fn export_archive(&self) -> Result<Archive> {
        self.exporter.export_to(self.sink.as_ref()).await
    }

    pub async fn list_captures(&self) -> Result<Vec<Capture>> {
        self.store.list().await
    }

    pub async fn clear_captures(&self) -> Result<()> {
        self.store.clear().await
    }

    pub fn list_matching_scrapers(&self, url: &str) -> Vec<ScraperSummary> {
        self.registry
            .find_matching_scrapers(url)
            .iter()
            .map(|s| s.summary())
            .collect()
    }

    pub fn list_all_scrapers(&self) -> Vec<ScraperSummary> {
        self.registry.get_all_scrapers().iter().map(|s| s.summary()).collect()
    }

    pub async fn run_scraper(&self, id: &str, mode: SaveMode, request: DocumentRequest) -> Result<ScraperRun> {
        let scraper = self
            .registry
            .get_scraper(id)
            .ok_or_else(|| AppError::NotFoundError(format!("no scraper registered as {}", id)))?;

        let doc = self.loader.load(request).await?;
        let result = scraper.run(&doc)?;
        let content = serde_json::to_string_pretty(&result)
            .map_err(|e| AppError::ExtractionError(format!("cannot encode result: {}", e)))?;
        let filename = scraper_filename(&scraper.id, &doc.url, Utc::now());

        self.route(mode, &filename, &content, &doc.url, &doc.title).await?;
        info!(scraper = %scraper.id, count = result.count, ?mode, "scraper finished");
        Ok(ScraperRun {
            result,
            filename,
            stored: mode == SaveMode::Batch,
        })
    }

    async fn route(&self, mode: SaveMode, filename: &str, content: &str, url: &str, title: &str) -> Result<()> {
        match mode {
            SaveMode::Direct => self.sink.deliver(content.as_bytes(), filename).await,
            SaveMode::Batch => self.store.append(filename, content, url, title).await.map(|_| ()),
        }
    }
}
