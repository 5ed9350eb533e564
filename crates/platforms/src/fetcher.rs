//! Item page fetching.
//!
//! Adapters that analyse the full item page go through `HtmlFetcher`, so
//! the engine can be driven by a fake in tests and by `HttpFetcher` for
//! real pages.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of raw HTML for a URL.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch_html(&self, url: &Url) -> Result<String>;
}

/// HTTP settings for item page fetches
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("listing-filter/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: 15,
        }
    }
}

/// `HtmlFetcher` over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HtmlFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "HTTP request failed with status {}: {}",
                response.status(),
                url
            );
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;
        debug!("Fetched {} ({} bytes)", url, text.len());
        Ok(text)
    }
}
