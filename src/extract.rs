//! Generic whole-document serialization and capture naming.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use crate::document::PageDocument;
use crate::error::{AppError, Result};

const FEED_ROOTS: &[&str] = &["rss", "feed", "rdf:RDF", "urlset"];
const MAX_PATH_LABEL: usize = 60;

/// Serialized form of a document, ready to be saved.
#[derive(Debug, Clone)]
pub struct Serialized {
    pub content: String,
    pub extension: &'static str,
}

/// Serializes the whole document without touching the source.
///
/// XML-family documents (by content type or feed root element) are written
/// back event by event so the tree survives as-is; everything else yields
/// the outer markup of the root element.
pub fn serialize_document(doc: &PageDocument) -> Result<Serialized> {
    if doc.source.trim().is_empty() {
        return Err(AppError::ExtractionError(format!("document for {} is empty", doc.url)));
    }

    let serialized = if is_xml_family(doc) {
        Serialized {
            content: serialize_xml(&doc.source)?,
            extension: "xml",
        }
    } else {
        let html = doc.parse_html()?;
        Serialized {
            content: html.root_element().html(),
            extension: "html",
        }
    };

    if serialized.content.trim().is_empty() {
        return Err(AppError::ExtractionError(format!("serializing {} produced no output", doc.url)));
    }
    Ok(serialized)
}

pub fn is_xml_family(doc: &PageDocument) -> bool {
    if doc.content_type.to_ascii_lowercase().contains("xml") {
        return true;
    }
    root_element_name(&doc.source)
        .map(|name| FEED_ROOTS.contains(&name.as_str()))
        .unwrap_or(false)
}

/// Name of the first element in an XML-ish source, skipping the prolog.
fn root_element_name(source: &str) -> Option<String> {
    let mut reader = Reader::from_str(source);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(Event::Text(t)) => {
                let raw: &[u8] = &t;
                if !raw.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
            }
            Ok(_) => {}
        }
    }
}

fn serialize_xml(source: &str) -> Result<String> {
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::with_capacity(source.len()));
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => writer
                .write_event(event)
                .map_err(|e| AppError::ExtractionError(format!("xml serialization failed: {}", e)))?,
            Err(e) => {
                return Err(AppError::ExtractionError(format!(
                    "malformed xml at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }
    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::ExtractionError(format!("xml serialization produced invalid utf-8: {}", e)))
}

/// `{host}[_{path}]_{timestamp}.{ext}` for a whole-document capture.
pub fn capture_filename(url: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.{}", page_label(url), timestamp_label(at), extension)
}

/// `{scraper}_{host}[_{path}]_{timestamp}.json` for a structured scraper result.
pub fn scraper_filename(scraper_id: &str, url: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}.json", sanitize(scraper_id), page_label(url), timestamp_label(at))
}

/// Millisecond resolution, so back-to-back captures get distinct names.
pub fn timestamp_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S-%3f").to_string()
}

fn page_label(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "page".to_string();
    };
    let host = parsed
        .host_str()
        .map(sanitize)
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "page".to_string());
    let path: String = sanitize(parsed.path())
        .trim_matches('_')
        .chars()
        .take(MAX_PATH_LABEL)
        .collect();
    let path = path.trim_end_matches('_');
    if path.is_empty() {
        host
    } else {
        format!("{}_{}", host, path)
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
