//! Declarative description of a marketplace.
//!
//! A `SiteDescriptor` captures everything about a site that is pure data:
//! which hosts it owns, which paths are listing pages, which selector finds
//! item containers and where their pictures live. The few behaviours that
//! differ per site (deriving an item URL) live on the adapter itself.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors raised while building a descriptor.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid pattern '{pattern}' for {site}: {source}")]
    Invalid {
        site: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Descriptor for {site} is missing {field}")]
    MissingField { site: String, field: &'static str },
}

/// Where the analysis HTML of an item comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HtmlSource {
    /// GET the item's canonical URL
    FetchItemPage,
    /// Use the markup of the listing container itself
    ListingMarkup,
}

/// Kind of page a URL points at, from a site's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Search,
    Item,
    Other,
}

/// Immutable, compiled description of one marketplace.
#[derive(Debug, Clone)]
pub struct SiteDescriptor {
    pub name: String,
    pub host_pattern: Regex,
    pub search_path_patterns: Vec<Regex>,
    pub item_path_pattern: Regex,
    pub item_selector: String,
    pub media_selectors: Vec<String>,
    pub html_source: HtmlSource,
}

impl SiteDescriptor {
    /// Start describing the site called `name`.
    pub fn builder(name: impl Into<String>) -> SiteDescriptorBuilder {
        SiteDescriptorBuilder {
            name: name.into(),
            host: None,
            search_paths: Vec::new(),
            item_path: None,
            item_selector: None,
            media_selectors: Vec::new(),
            html_source: HtmlSource::FetchItemPage,
        }
    }

    pub fn matches_host(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.host_pattern.is_match(host))
    }

    /// A listing page is one where any search pattern matches path+query.
    pub fn is_search_page(&self, url: &Url) -> bool {
        let target = path_and_query(url);
        self.search_path_patterns
            .iter()
            .any(|pattern| pattern.is_match(&target))
    }

    pub fn is_item_page(&self, url: &Url) -> bool {
        self.item_path_pattern.is_match(url.path())
    }
}

/// Builder for [`SiteDescriptor`]. Patterns are compiled in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SiteDescriptorBuilder {
    name: String,
    host: Option<String>,
    search_paths: Vec<String>,
    item_path: Option<String>,
    item_selector: Option<String>,
    media_selectors: Vec<String>,
    html_source: HtmlSource,
}

impl SiteDescriptorBuilder {
    pub fn host(mut self, pattern: &str) -> Self {
        self.host = Some(pattern.to_string());
        self
    }

    /// Add a listing pattern, matched against path and query.
    pub fn search_path(mut self, pattern: &str) -> Self {
        self.search_paths.push(pattern.to_string());
        self
    }

    pub fn item_path(mut self, pattern: &str) -> Self {
        self.item_path = Some(pattern.to_string());
        self
    }

    pub fn item_selector(mut self, selector: &str) -> Self {
        self.item_selector = Some(selector.to_string());
        self
    }

    /// Add a selector for the picture area of an item, tried in order.
    pub fn media_selector(mut self, selector: &str) -> Self {
        self.media_selectors.push(selector.to_string());
        self
    }

    pub fn html_source(mut self, source: HtmlSource) -> Self {
        self.html_source = source;
        self
    }

    pub fn build(self) -> Result<SiteDescriptor, PatternError> {
        let site = self.name.clone();
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| PatternError::Invalid {
                site: site.clone(),
                pattern: pattern.to_string(),
                source,
            })
        };
        let missing = |field| PatternError::MissingField {
            site: site.clone(),
            field,
        };

        let host_pattern = compile(self.host.as_deref().ok_or_else(|| missing("host"))?)?;
        let item_path_pattern =
            compile(self.item_path.as_deref().ok_or_else(|| missing("item path"))?)?;
        let item_selector = self.item_selector.ok_or_else(|| missing("item selector"))?;
        let search_path_patterns = self
            .search_paths
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SiteDescriptor {
            name: self.name,
            host_pattern,
            search_path_patterns,
            item_path_pattern,
            item_selector,
            media_selectors: self.media_selectors,
            html_source: self.html_source,
        })
    }
}

/// `/path?query`, or just `/path` when the URL has no query.
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
