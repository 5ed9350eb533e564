//! leboncoin.fr adapter.
//!
//! Listing cards are links to `/ad/<category>/<id>`. The analysis needs the
//! full ad page (description, condition), so item HTML is fetched.

use crate::descriptor::{HtmlSource, PatternError, SiteDescriptor};
use crate::traits::{PlatformAdapter, absolute_link, container_href};
use dom::{ElementId, Page};
use url::Url;

pub struct LeboncoinAdapter {
    descriptor: SiteDescriptor,
}

impl LeboncoinAdapter {
    pub fn new() -> Result<Self, PatternError> {
        let descriptor = SiteDescriptor::builder("leboncoin")
            .host(r"(^|\.)leboncoin\.fr$")
            .search_path(r"^/recherche")
            .search_path(r"^/c/")
            .item_path(r"^/ad/[^/]+/\d+")
            .item_selector(r#"[data-qa-id="aditem_container"]"#)
            .media_selector(r#"[data-test-id="adcard-image"]"#)
            .media_selector("picture")
            .html_source(HtmlSource::FetchItemPage)
            .build()?;
        Ok(Self { descriptor })
    }
}

impl PlatformAdapter for LeboncoinAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn item_url(&self, page: &dyn Page, element: ElementId) -> Option<Url> {
        let href = container_href(page, element, r#"a[href*="/ad/"]"#)?;
        let url = absolute_link(page.url(), &href, false)?;
        (self.matches_host(&url) && self.is_item_page(&url)).then_some(url)
    }
}
