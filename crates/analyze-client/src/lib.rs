//! Client for the external item analysis API.
//!
//! The API decides, for each listing item, which of the user's
//! natural-language filters it satisfies. This crate handles:
//! - The JSON wire contract of `POST /items/analyze`
//! - Error mapping for non-success responses (`{detail}` or plain text)
//! - The auxiliary endpoints: health, auth check and cache clearing
//!
//! The engine only depends on the [`Analyzer`] trait, so tests can swap the
//! HTTP client for a fake.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

/// Verdict for one item: filter description -> matched
pub type FilterMatches = HashMap<String, bool>;

/// Verdicts for a batch, aligned by position with the request's items
pub type AnalysisResult = Vec<FilterMatches>;

const API_KEY_HEADER: &str = "X-API-Key";

/// Errors that can occur when talking to the analysis API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeClientError {
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to reach analysis API: {0}")]
    Transport(String),

    #[error("Analysis API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response from analysis API: {0}")]
    InvalidResponse(String),
}

impl AnalyzeClientError {
    /// HTTP status, when the API answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// One item submitted for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeItem {
    pub platform: String,
    pub url: String,
    pub html: String,
}

/// Body of `POST /items/analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub items: Vec<AnalyzeItem>,
    pub filters: Vec<String>,
}

/// Success body of `POST /items/analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub filters: AnalysisResult,
}

#[derive(Debug, Deserialize)]
struct CacheClearResponse {
    entries_cleared: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

// =============================================================================
// Analyzer trait
// =============================================================================

/// Anything that can turn an analysis request into per-item verdicts.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyse a batch in a single round-trip.
    ///
    /// The returned vector is never longer than `request.items`; it may be
    /// shorter, in which case trailing items have no verdict.
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalyzeClientError>;
}

// =============================================================================
// HTTP client
// =============================================================================

/// Connection settings for the analysis API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            api_key: None,
            timeout_seconds: 30,
            user_agent: concat!("listing-filter/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP client for the analysis API.
#[derive(Debug, Clone)]
pub struct AnalyzeClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl AnalyzeClient {
    /// Build a client for the configured endpoint.
    ///
    /// No request is made here; call [`health`](Self::health) to check the endpoint.
    pub fn new(config: ClientConfig) -> Result<Self, AnalyzeClientError> {
        let mut endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AnalyzeClientError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| AnalyzeClientError::Transport(e.to_string()))?;

        info!("Analysis API endpoint: {}", endpoint);
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Base address of the API this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `GET /health`: true on any 2xx.
    pub async fn health(&self) -> Result<bool, AnalyzeClientError> {
        let response = self.client.get(self.route("health")?).send().await.map_err(transport)?;
        debug!("Health check returned {}", response.status());
        Ok(response.status().is_success())
    }

    /// `GET /auth/check`: true when the configured key (if any) is accepted.
    pub async fn auth_check(&self) -> Result<bool, AnalyzeClientError> {
        let request = self.with_key(self.client.get(self.route("auth/check")?));
        let response = request.send().await.map_err(transport)?;
        debug!("Auth check returned {}", response.status());
        Ok(response.status().is_success())
    }

    /// `POST /cache/clear`: number of cache entries removed by the API.
    pub async fn clear_cache(&self) -> Result<u64, AnalyzeClientError> {
        let request = self.with_key(self.client.post(self.route("cache/clear")?));
        let response = check_status(request.send().await.map_err(transport)?).await?;
        let body: CacheClearResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeClientError::InvalidResponse(e.to_string()))?;
        info!("Analysis cache cleared ({} entries)", body.entries_cleared);
        Ok(body.entries_cleared)
    }

    fn route(&self, path: &str) -> Result<Url, AnalyzeClientError> {
        self.endpoint
            .join(path)
            .map_err(|e| AnalyzeClientError::InvalidEndpoint(e.to_string()))
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

#[async_trait]
impl Analyzer for AnalyzeClient {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalyzeClientError> {
        let expected_len = request.items.len();
        debug!(
            "Analyzing {} items against {} filters",
            expected_len,
            request.filters.len()
        );

        let response = self
            .with_key(self.client.post(self.route("items/analyze")?))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Analysis request failed: {}", e);
                transport(e)
            })?;
        let response = check_status(response).await?;

        let body: AnalyzeResponse = response.json().await.map_err(|e| {
            error!("Malformed analysis response: {}", e);
            AnalyzeClientError::InvalidResponse(e.to_string())
        })?;

        let mut verdicts = body.filters;
        if verdicts.len() > expected_len {
            warn!(
                "Analysis returned {} verdicts for {} items; extra verdicts ignored",
                verdicts.len(),
                expected_len
            );
            verdicts.truncate(expected_len);
        } else if verdicts.len() < expected_len {
            warn!(
                "Analysis returned {} verdicts for {} items; remaining items stay untouched",
                verdicts.len(),
                expected_len
            );
        }
        Ok(verdicts)
    }
}

fn transport(e: reqwest::Error) -> AnalyzeClientError {
    AnalyzeClientError::Transport(e.to_string())
}

/// Pass 2xx responses through, turn anything else into `Http`.
async fn check_status(response: Response) -> Result<Response, AnalyzeClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    error!("Analysis API error {}: {}", status.as_u16(), message);
    Err(AnalyzeClientError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Prefer a JSON `detail`, then the raw body, then the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { detail }) = serde_json::from_str::<ErrorBody>(body) {
        return match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}
