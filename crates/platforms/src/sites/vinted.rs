//! vinted adapter (all country domains).
//!
//! Grid items wrap a link to `/items/<id>-<slug>`. Item pages are fetched
//! for analysis.

use crate::descriptor::{HtmlSource, PatternError, SiteDescriptor};
use crate::traits::{PlatformAdapter, absolute_link, container_href};
use dom::{ElementId, Page};
use url::Url;

pub struct VintedAdapter {
    descriptor: SiteDescriptor,
}

impl VintedAdapter {
    pub fn new() -> Result<Self, PatternError> {
        let descriptor = SiteDescriptor::builder("vinted")
            .host(r"(^|\.)vinted\.[a-z]{2,3}(\.[a-z]{2})?$")
            .search_path(r"^/catalog")
            .search_path(r"[?&]search_text=")
            .item_path(r"^/items/\d+")
            .item_selector(r#"[data-testid="grid-item"]"#)
            .media_selector(".new-item-box__image")
            .media_selector("img")
            .html_source(HtmlSource::FetchItemPage)
            .build()?;
        Ok(Self { descriptor })
    }
}

impl PlatformAdapter for VintedAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn item_url(&self, page: &dyn Page, element: ElementId) -> Option<Url> {
        let href = container_href(page, element, r#"a[href*="/items/"]"#)?;
        let url = absolute_link(page.url(), &href, false)?;
        (self.matches_host(&url) && self.is_item_page(&url)).then_some(url)
    }
}
