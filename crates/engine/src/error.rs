//! Errors returned by the filter engine.
//!
//! Every variant is recoverable by the user. A failed call leaves the
//! engine usable and never leaves a half-built session behind.

use analyze_client::AnalyzeClientError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("No filters to apply")]
    EmptyFilterSpec,

    #[error("Unsupported page: {url}")]
    UnsupportedPage { url: String },

    #[error("No usable items found on this {platform} page")]
    NoItemsFound { platform: String },

    /// The analysis API failed; `status` is absent for transport errors
    #[error("Analysis API error: {message}")]
    AnalysisApiError { status: Option<u16>, message: String },

    #[error("No filters have been applied on this page")]
    NoActiveSession,

    #[error("Filtering was cancelled by a newer request")]
    Cancelled,
}

impl From<AnalyzeClientError> for FilterError {
    fn from(err: AnalyzeClientError) -> Self {
        let status = err.status();
        let message = match err {
            AnalyzeClientError::Http { message, .. } => message,
            other => other.to_string(),
        };
        FilterError::AnalysisApiError { status, message }
    }
}
