//! Core trait for marketplace adapters.
//!
//! Each supported site implements `PlatformAdapter`. Most behaviour is
//! provided by default methods driven by the site's [`SiteDescriptor`];
//! a site only has to say how an item container maps to a canonical URL.

use crate::descriptor::{HtmlSource, PageKind, SiteDescriptor};
use crate::fetcher::HtmlFetcher;
use async_trait::async_trait;
use dom::{ElementId, Page};
use tracing::warn;
use url::Url;

/// An item container that yielded a usable URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub element: ElementId,
    pub url: Url,
    /// Markup of the container, captured when the item was enumerated
    pub markup: String,
}

/// Capability set of a supported marketplace.
///
/// ## Design Note
/// - `Send + Sync` so a registry can be shared with the engine task
/// - Page access goes through `&dyn Page`, adapters never mutate the page
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The declarative part of the adapter
    fn descriptor(&self) -> &SiteDescriptor;

    /// Unique name of the adapter (for logging and vendor info)
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn matches_host(&self, url: &Url) -> bool {
        self.descriptor().matches_host(url)
    }

    fn is_search_page(&self, url: &Url) -> bool {
        self.descriptor().is_search_page(url)
    }

    fn is_item_page(&self, url: &Url) -> bool {
        self.descriptor().is_item_page(url)
    }

    fn page_kind(&self, url: &Url) -> PageKind {
        if self.is_search_page(url) {
            PageKind::Search
        } else if self.is_item_page(url) {
            PageKind::Item
        } else {
            PageKind::Other
        }
    }

    /// Candidate item containers, in document order.
    fn item_elements(&self, page: &dyn Page) -> Vec<ElementId> {
        let selector = &self.descriptor().item_selector;
        page.select(selector).unwrap_or_else(|e| {
            warn!("{}: item selector failed: {}", self.name(), e);
            Vec::new()
        })
    }

    /// Canonical absolute URL of an item, or `None` to skip the container.
    fn item_url(&self, page: &dyn Page, element: ElementId) -> Option<Url>;

    /// Where badges go: the picture area of the item, if one is found.
    fn media_container(&self, page: &dyn Page, element: ElementId) -> Option<ElementId> {
        self.descriptor()
            .media_selectors
            .iter()
            .find_map(|selector| page.select_within(element, selector).ok().flatten())
    }

    /// HTML handed to the analysis API for this item.
    ///
    /// Never fails: a fetch error degrades to an empty string for this item.
    async fn item_html(&self, item: &ListingItem, fetcher: &dyn HtmlFetcher) -> String {
        match self.descriptor().html_source {
            HtmlSource::ListingMarkup => item.markup.clone(),
            HtmlSource::FetchItemPage => match fetcher.fetch_html(&item.url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("{}: could not fetch {}: {:#}", self.name(), item.url, e);
                    String::new()
                }
            },
        }
    }
}

/// Resolve an `href` against the page address, keeping only http(s) links.
/// The fragment is always dropped; the query only when `keep_query` is false.
pub fn absolute_link(base: &Url, href: &str, keep_query: bool) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    if !keep_query {
        url.set_query(None);
    }
    Some(url)
}

/// The container's own `href`, or the first matching link inside it.
pub fn container_href(page: &dyn Page, element: ElementId, link_selector: &str) -> Option<String> {
    page.attribute(element, "href").or_else(|| {
        page.select_within(element, link_selector)
            .ok()
            .flatten()
            .and_then(|link| page.attribute(link, "href"))
    })
}
