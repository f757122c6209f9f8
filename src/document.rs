use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, header::CONTENT_TYPE};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{AppError, Result};

// Create a static client to reuse connections
static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build HTTP client")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("title").expect("Failed to parse title selector")
});

/// A document snapshot as sent by the extension popup.
///
/// When `source` is absent the loader fetches `url` itself.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// The handle extractors work on. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub url: String,
    pub title: String,
    pub content_type: String,
    pub source: String,
}

impl PageDocument {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content_type: impl Into<String>, source: impl Into<String>) -> Self {
        PageDocument {
            url: url.into(),
            title: title.into(),
            content_type: content_type.into(),
            source: source.into(),
        }
    }

    pub fn html(url: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(url, title, "text/html", source)
    }

    /// Parses the source as HTML, failing if there is nothing to parse.
    pub fn parse_html(&self) -> Result<Html> {
        if self.source.trim().is_empty() {
            return Err(AppError::ExtractionError(format!("document for {} is empty", self.url)));
        }
        Ok(Html::parse_document(&self.source))
    }
}

/// Obtains the document a capture or scraper run operates on.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, request: DocumentRequest) -> Result<PageDocument>;
}

/// Uses the inline source when the popup sent one, otherwise fetches the page.
#[derive(Debug, Default, Clone)]
pub struct HttpDocumentLoader;

#[async_trait]
impl DocumentLoader for HttpDocumentLoader {
    async fn load(&self, request: DocumentRequest) -> Result<PageDocument> {
        if let Some(source) = request.source {
            let content_type = request.content_type.unwrap_or_else(|| "text/html".to_string());
            return Ok(PageDocument::new(request.url, request.title, content_type, source));
        }

        if request.url.trim().is_empty() {
            return Err(AppError::ExtractionError("no document source or url given".to_string()));
        }

        debug!(url = %request.url, "fetching document");
        let (source, fetched_type) = fetch_source(&request.url).await?;
        let content_type = request.content_type.or(fetched_type).unwrap_or_else(|| "text/html".to_string());
        let title = if request.title.is_empty() {
            extract_title(&source).unwrap_or_default()
        } else {
            request.title
        };

        Ok(PageDocument::new(request.url, title, content_type, source))
    }
}

pub async fn fetch_source(url: &str) -> Result<(String, Option<String>)> {
    let response = CLIENT.get(url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await?;
    Ok((body, content_type))
}

pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    document.select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}
