//! amazon adapter (all country domains).
//!
//! Search results carry their ASIN in `data-asin`, so the canonical URL is
//! built rather than read from a link. Product pages block automated
//! fetches, so the result card markup is analysed instead.

use crate::descriptor::{HtmlSource, PatternError, SiteDescriptor};
use crate::traits::PlatformAdapter;
use dom::{ElementId, Page};
use url::Url;

pub struct AmazonAdapter {
    descriptor: SiteDescriptor,
}

impl AmazonAdapter {
    pub fn new() -> Result<Self, PatternError> {
        let descriptor = SiteDescriptor::builder("amazon")
            .host(r"(^|\.)amazon\.[a-z]{2,3}(\.[a-z]{2})?$")
            .search_path(r"^/s(/|\?|$)")
            .search_path(r"[?&]k=")
            .item_path(r"/dp/[A-Z0-9]{10}")
            .item_selector(r#"div[data-component-type="s-search-result"]"#)
            .media_selector(".s-product-image-container")
            .media_selector("img.s-image")
            .html_source(HtmlSource::ListingMarkup)
            .build()?;
        Ok(Self { descriptor })
    }
}

impl PlatformAdapter for AmazonAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn item_url(&self, page: &dyn Page, element: ElementId) -> Option<Url> {
        let asin = page.attribute(element, "data-asin")?;
        let asin = asin.trim();
        if asin.len() != 10 || !asin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }

        let base = page.url();
        let host = base.host_str()?;
        Url::parse(&format!("{}://{}/dp/{}", base.scheme(), host, asin.to_ascii_uppercase())).ok()
    }
}
