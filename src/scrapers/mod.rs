//! Structured results shared by every site scraper, plus the built-in set.

pub mod profiles;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::document::PageDocument;
use crate::error::{AppError, Result};
use crate::registry::ScraperRegistry;

/// A record with a natural key used for dedup and ordering.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<Value>,
    pub count: usize,
    pub extracted_at: DateTime<Utc>,
    pub page_url: String,
    pub page_title: String,
}

impl StructuredResult {
    /// Normalizes `records` and wraps them with page provenance.
    pub fn from_records<T: Keyed + Serialize>(kind: &str, records: Vec<T>, doc: &PageDocument) -> Result<Self> {
        let data = normalize(records)
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::ExtractionError(format!("cannot encode {} records: {}", kind, e)))?;
        Ok(StructuredResult {
            kind: kind.to_string(),
            count: data.len(),
            data,
            extracted_at: Utc::now(),
            page_url: doc.url.clone(),
            page_title: doc.title.clone(),
        })
    }

    pub fn empty(kind: &str, doc: &PageDocument) -> Self {
        StructuredResult {
            kind: kind.to_string(),
            data: Vec::new(),
            count: 0,
            extracted_at: Utc::now(),
            page_url: doc.url.clone(),
            page_title: doc.title.clone(),
        }
    }
}

/// Drops later duplicates of a key, then sorts ascending by key.
pub fn normalize<T: Keyed>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut unique: Vec<T> = records
        .into_iter()
        .filter(|r| seen.insert(r.key().to_string()))
        .collect();
    unique.sort_by(|a, b| a.key().cmp(b.key()));
    unique
}

/// Registry with every scraper that ships with the service.
pub fn builtin_registry() -> Result<ScraperRegistry> {
    let mut registry = ScraperRegistry::new();
    registry.register(profiles::linkedin_people()?)?;
    Ok(registry)
}
