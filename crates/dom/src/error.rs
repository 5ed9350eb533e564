//! Error types for the dom crate.

use thiserror::Error;

/// Errors that can occur while querying a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// A CSS selector could not be parsed
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// An element handle does not belong to this page
    #[error("Unknown element: {0}")]
    UnknownElement(usize),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DomError>;
