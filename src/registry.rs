//! Named, URL-gated scrapers.
//!
//! The registry is a plain value built at startup and shared through
//! [`crate::AppState`]; there is no global instance.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::document::PageDocument;
use crate::error::{AppError, Result};
use crate::scrapers::StructuredResult;

/// Site-specific extraction logic.
pub trait Extract: Send + Sync {
    fn extract(&self, doc: &PageDocument) -> Result<StructuredResult>;
}

const REGEX_PREFIX: &str = "re:";

/// Either a literal substring or a regular expression tested against a URL.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Literal(String),
    Regex(Regex),
}

impl UrlPattern {
    /// `re:<expr>` is a regex, anything else a literal substring.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.strip_prefix(REGEX_PREFIX) {
            Some(expr) if !expr.is_empty() => Regex::new(expr)
                .map(UrlPattern::Regex)
                .map_err(|e| AppError::ValidationError(format!("bad url pattern {}: {}", raw, e))),
            Some(_) => Err(AppError::ValidationError(format!("empty regex in url pattern {}", raw))),
            None if raw.is_empty() => Err(AppError::ValidationError("empty url pattern".to_string())),
            None => Ok(UrlPattern::Literal(raw.to_string())),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Literal(needle) => url.contains(needle.as_str()),
            UrlPattern::Regex(re) => re.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Literal(s) => f.write_str(s),
            UrlPattern::Regex(re) => write!(f, "{}{}", REGEX_PREFIX, re.as_str()),
        }
    }
}

/// Registration input. Every field is required; they are optional here so
/// that incomplete registrations can be rejected instead of panicking.
#[derive(Default, Clone)]
pub struct ScraperSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url_patterns: Vec<UrlPattern>,
    pub extract: Option<Arc<dyn Extract>>,
}

impl ScraperSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        ScraperSpec {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn pattern(mut self, pattern: UrlPattern) -> Self {
        self.url_patterns.push(pattern);
        self
    }

    pub fn extract(mut self, extract: Arc<dyn Extract>) -> Self {
        self.extract = Some(extract);
        self
    }
}

/// A validated, registered scraper.
pub struct Scraper {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url_patterns: Vec<UrlPattern>,
    extract: Arc<dyn Extract>,
}

impl Scraper {
    pub fn matches(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|p| p.matches(url))
    }

    pub fn run(&self, doc: &PageDocument) -> Result<StructuredResult> {
        self.extract.extract(doc)
    }

    pub fn summary(&self) -> ScraperSummary {
        ScraperSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for Scraper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scraper")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url_patterns", &self.url_patterns)
            .finish_non_exhaustive()
    }
}

/// Display-only view handed to the popup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScraperSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: Vec<Arc<Scraper>>,
    index: HashMap<String, usize>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and inserts `spec`. An existing id is overwritten in place
    /// and keeps its registration position.
    pub fn register(&mut self, spec: ScraperSpec) -> Result<Arc<Scraper>> {
        let id = required(spec.id, "id")?;
        let name = required(spec.name, "name")?;
        if spec.url_patterns.is_empty() {
            return Err(AppError::ValidationError(format!("scraper {} has no urlPatterns", id)));
        }
        let extract = spec
            .extract
            .ok_or_else(|| AppError::ValidationError(format!("scraper {} has no extract", id)))?;

        let scraper = Arc::new(Scraper {
            id: id.clone(),
            name,
            description: spec.description.unwrap_or_default(),
            url_patterns: spec.url_patterns,
            extract,
        });

        match self.index.get(&id) {
            Some(&slot) => {
                debug!(id = %id, "overwriting registered scraper");
                self.scrapers[slot] = Arc::clone(&scraper);
            }
            None => {
                self.index.insert(id.clone(), self.scrapers.len());
                self.scrapers.push(Arc::clone(&scraper));
            }
        }
        info!(id = %id, "scraper registered");
        Ok(scraper)
    }

    pub fn find_matching_scrapers(&self, url: &str) -> Vec<Arc<Scraper>> {
        self.scrapers.iter().filter(|s| s.matches(url)).cloned().collect()
    }

    pub fn get_scraper(&self, id: &str) -> Option<Arc<Scraper>> {
        self.index.get(id).map(|&slot| Arc::clone(&self.scrapers[slot]))
    }

    pub fn get_all_scrapers(&self) -> Vec<Arc<Scraper>> {
        self.scrapers.clone()
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}

fn required(field: Option<String>, what: &str) -> Result<String> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError(format!("scraper {} is missing", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Extract for Fixed {
        fn extract(&self, doc: &PageDocument) -> Result<StructuredResult> {
            Ok(StructuredResult::empty(self.0, doc))
        }
    }

    fn spec(id: &str, pattern: &str) -> ScraperSpec {
        ScraperSpec::new(id, format!("{} scraper", id))
            .pattern(UrlPattern::parse(pattern).unwrap())
            .extract(Arc::new(Fixed("test")))
    }

    #[test]
    fn literal_and_regex_patterns() {
        assert!(matches!(UrlPattern::parse("example.com/people").unwrap(), UrlPattern::Literal(_)));
        let re = UrlPattern::parse(r"re:example\.com/p\d+").unwrap();
        assert!(re.matches("https://example.com/p42"));
        assert!(!re.matches("https://example.com/people"));
        assert_eq!(re.to_string(), r"re:example\.com/p\d+");
        assert!(UrlPattern::parse("re:(").is_err());
        assert!(UrlPattern::parse("re:").is_err());
        assert!(UrlPattern::parse("").is_err());
    }

    #[test]
    fn slash_wrapped_pattern_is_a_plain_substring() {
        let path = UrlPattern::parse("/in/").unwrap();
        assert!(matches!(path, UrlPattern::Literal(ref s) if s == "/in/"));
        assert!(path.matches("https://www.linkedin.com/in/someone"));
        assert!(!path.matches("https://www.linkedin.com/jobs/view/123"));
        assert!(!path.matches("https://example.com/info"));
    }

    #[test]
    fn matching_follows_registration_order() {
        let mut registry = ScraperRegistry::new();
        registry.register(spec("b", "example.com")).unwrap();
        registry.register(spec("a", "re:example\\.com")).unwrap();
        registry.register(spec("c", "other.org")).unwrap();

        let ids: Vec<_> = registry
            .find_matching_scrapers("https://example.com/people/list")
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(registry.find_matching_scrapers("https://nothing.net").is_empty());
    }

    #[test]
    fn missing_extract_is_rejected_without_mutation() {
        let mut registry = ScraperRegistry::new();
        let incomplete = ScraperSpec::new("x", "X").pattern(UrlPattern::Literal("x.com".into()));
        let err = registry.register(incomplete).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(registry.is_empty());
        assert!(registry.get_scraper("x").is_none());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut registry = ScraperRegistry::new();
        let no_patterns = ScraperSpec::new("x", "X").extract(Arc::new(Fixed("t")));
        assert!(registry.register(no_patterns).is_err());

        let mut no_name = spec("x", "x.com");
        no_name.name = Some("  ".into());
        assert!(registry.register(no_name).is_err());

        let mut no_id = spec("x", "x.com");
        no_id.id = None;
        assert!(registry.register(no_id).is_err());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn reregistering_overwrites_in_place() {
        let mut registry = ScraperRegistry::new();
        registry.register(spec("a", "a.com")).unwrap();
        registry.register(spec("b", "b.com")).unwrap();
        registry
            .register(spec("a", "new.com").description("replacement"))
            .unwrap();

        let all = registry.get_all_scrapers();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a");
        assert_eq!(all[0].description, "replacement");
        assert!(registry.find_matching_scrapers("https://a.com").is_empty());
        assert_eq!(registry.get_scraper("a").unwrap().summary().description, "replacement");
    }
}
