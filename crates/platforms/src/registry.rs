//! The PlatformRegistry resolves which adapter owns a page.
//!
//! The registry is built once at startup and then only read. It is passed
//! to the engine explicitly, so tests can substitute their own adapters.

use crate::descriptor::PatternError;
use crate::sites::{AmazonAdapter, LeboncoinAdapter, VintedAdapter};
use crate::traits::PlatformAdapter;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors raised while registering adapters.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Adapter name must not be empty")]
    EmptyName,

    #[error("Adapter name '{0}' has leading or trailing whitespace")]
    UntrimmedName(String),

    #[error("An adapter named '{0}' is already registered")]
    DuplicateAdapter(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Ordered set of adapters, resolved by first host match.
///
/// ## Usage
/// ```ignore
/// let registry = PlatformRegistry::builtin()?;
/// if let Some(adapter) = registry.resolve(&url) {
///     println!("{} handles {}", adapter.name(), url);
/// }
/// ```
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registry holding every built-in marketplace.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new()
            .with_adapter(LeboncoinAdapter::new()?)?
            .with_adapter(VintedAdapter::new()?)?
            .with_adapter(AmazonAdapter::new()?)
    }

    /// Add an adapter (builder pattern).
    pub fn with_adapter(
        mut self,
        adapter: impl PlatformAdapter + 'static,
    ) -> Result<Self, RegistryError> {
        self.register(adapter)?;
        Ok(self)
    }

    /// Add an adapter after the existing ones.
    ///
    /// Names must be non-empty, free of surrounding whitespace and unique.
    /// A rejected adapter leaves the registry unchanged.
    pub fn register(&mut self, adapter: impl PlatformAdapter + 'static) -> Result<(), RegistryError> {
        let name = adapter.name();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.trim() != name {
            return Err(RegistryError::UntrimmedName(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(RegistryError::DuplicateAdapter(name.to_string()));
        }

        debug!("Registered platform adapter: {}", name);
        self.adapters.push(Arc::new(adapter));
        Ok(())
    }

    /// The first adapter whose host pattern matches `url`.
    ///
    /// `None` is not an error: it means the site is unsupported. When more
    /// than one adapter claims the host the first registered one wins and
    /// the overlap is logged.
    pub fn resolve(&self, url: &Url) -> Option<Arc<dyn PlatformAdapter>> {
        let mut matching = self.adapters.iter().filter(|a| a.matches_host(url));
        let first = matching.next()?;

        let others: Vec<&str> = matching.map(|a| a.name()).collect();
        if !others.is_empty() {
            warn!(
                "Host {} is claimed by several adapters; using {} over {}",
                url.host_str().unwrap_or_default(),
                first.name(),
                others.join(", ")
            );
        }
        Some(first.clone())
    }

    /// True iff an adapter owns `url` and considers it a listing page.
    pub fn is_listing_page(&self, url: &Url) -> bool {
        self.resolve(url)
            .is_some_and(|adapter| adapter.is_search_page(url))
    }

    /// Look up an adapter by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Adapter names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
