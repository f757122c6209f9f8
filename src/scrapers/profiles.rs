//! Profile-link scraper for people-search result pages.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::{Keyed, StructuredResult};
use crate::document::PageDocument;
use crate::error::Result;
use crate::registry::{Extract, ScraperSpec, UrlPattern};

static LABELLED_LINKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[aria-label][href]").expect("Failed to parse labelled link selector")
});

static ALL_LINKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to parse link selector")
});

static RESULT_CONTAINER: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("li, [data-result]").expect("Failed to parse container selector")
});

static BLURB: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".entity-result__primary-subtitle, .subtitle").expect("Failed to parse blurb selector")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRecord {
    pub url: String,
    pub name: String,
    pub blurb: String,
}

impl Keyed for ProfileRecord {
    fn key(&self) -> &str {
        &self.url
    }
}

/// Collects links to profile pages whose path contains `profile_path`.
#[derive(Debug, Clone)]
pub struct ProfileLinkScraper {
    profile_path: String,
}

impl ProfileLinkScraper {
    pub fn new(profile_path: impl Into<String>) -> Self {
        ProfileLinkScraper {
            profile_path: profile_path.into(),
        }
    }

    /// Absolute profile URL without query or fragment.
    fn profile_id(&self, href: &str, base: Option<&Url>) -> Option<String> {
        if !href.contains(self.profile_path.as_str()) {
            return None;
        }
        let resolved = match base {
            Some(base) => base.join(href).ok(),
            None => Url::parse(href).ok(),
        };
        match resolved {
            Some(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                Some(url.to_string())
            }
            None => href.split(['?', '#']).next().map(str::to_string),
        }
    }

    fn record(&self, anchor: ElementRef<'_>, id: String) -> ProfileRecord {
        let mut name = collapse(anchor.text());
        if name.is_empty() {
            name = anchor.value().attr("aria-label").map(|l| collapse([l])).unwrap_or_default();
        }
        ProfileRecord {
            url: id,
            name,
            blurb: blurb_near(anchor),
        }
    }
}

impl Extract for ProfileLinkScraper {
    fn extract(&self, doc: &PageDocument) -> Result<StructuredResult> {
        let html = doc.parse_html()?;
        let base = Url::parse(&doc.url).ok();
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        // Strict pass: links explicitly labelled as profile links.
        for anchor in html.select(&LABELLED_LINKS) {
            let labelled = anchor
                .value()
                .attr("aria-label")
                .is_some_and(|l| l.to_lowercase().contains("profile"));
            if !labelled {
                continue;
            }
            let Some(id) = anchor.value().attr("href").and_then(|h| self.profile_id(h, base.as_ref())) else {
                continue;
            };
            if seen.insert(id.clone()) {
                records.push(self.record(anchor, id));
            }
        }
        let strict = records.len();

        // Broad pass: any other link to a profile, never replacing a strict hit.
        for anchor in html.select(&ALL_LINKS) {
            let Some(id) = anchor.value().attr("href").and_then(|h| self.profile_id(h, base.as_ref())) else {
                continue;
            };
            if seen.insert(id.clone()) {
                records.push(self.record(anchor, id));
            }
        }
        debug!(strict, broad = records.len() - strict, url = %doc.url, "profile links collected");

        StructuredResult::from_records("profiles", records, doc)
    }
}

/// Text of the first blurb element inside the nearest result container.
fn blurb_near(anchor: ElementRef<'_>) -> String {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| RESULT_CONTAINER.matches(el))
        .and_then(|container| container.select(&BLURB).next())
        .map(|blurb| collapse(blurb.text()))
        .unwrap_or_default()
}

fn collapse<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn linkedin_people() -> Result<ScraperSpec> {
    Ok(ScraperSpec::new("linkedin-people", "LinkedIn people")
        .description("Profile links, names and headlines from people search and network pages")
        .pattern(UrlPattern::parse("linkedin.com/search/results/people")?)
        .pattern(UrlPattern::parse(r"re:linkedin\.com/mynetwork/?")?)
        .extract(Arc::new(ProfileLinkScraper::new("/in/"))))
}
