//! User-authored filter descriptions.

use crate::error::FilterError;
use std::collections::HashSet;

/// Ordered, trimmed, de-duplicated, non-empty set of filter descriptions.
///
/// The descriptions are opaque to the engine and forwarded verbatim (after
/// trimming) to the analysis API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    filters: Vec<String>,
}

impl FilterSpec {
    /// Normalise `filters`, keeping the first occurrence of each description.
    ///
    /// # Returns
    /// * `Err(FilterError::EmptyFilterSpec)` - nothing left after trimming
    pub fn new<I, S>(filters: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let filters: Vec<String> = filters
            .into_iter()
            .map(|f| f.as_ref().trim().to_string())
            .filter(|f| !f.is_empty())
            .filter(|f| seen.insert(f.clone()))
            .collect();

        if filters.is_empty() {
            return Err(FilterError::EmptyFilterSpec);
        }
        Ok(Self { filters })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.filters.clone()
    }
}
