//! # Platforms Crate
//!
//! Marketplace adapters and the registry that picks one for a page.
//!
//! ## Components
//!
//! ### PlatformAdapter
//! Capability set of one marketplace: recognise its pages, enumerate item
//! containers, derive a canonical URL and the HTML to analyse per item.
//! Built from a declarative [`SiteDescriptor`] plus one URL rule.
//!
//! ### PlatformRegistry
//! Ordered adapters, resolved by first host match. Constructed once and
//! handed to the engine.
//!
//! ### HtmlFetcher
//! Item page retrieval, with a `reqwest` implementation.
//!
//! ## Example Usage
//!
//! ```ignore
//! use platforms::PlatformRegistry;
//!
//! let registry = PlatformRegistry::builtin()?;
//! let adapter = registry.resolve(page.url()).expect("unsupported site");
//! let urls: Vec<_> = adapter
//!     .item_elements(&page)
//!     .into_iter()
//!     .filter_map(|e| adapter.item_url(&page, e))
//!     .collect();
//! ```

pub mod descriptor;
pub mod fetcher;
pub mod registry;
pub mod sites;
pub mod traits;

// Re-export main types
pub use descriptor::{HtmlSource, PageKind, PatternError, SiteDescriptor};
pub use fetcher::{FetcherConfig, HtmlFetcher, HttpFetcher};
pub use registry::{PlatformRegistry, RegistryError};
pub use sites::{AmazonAdapter, LeboncoinAdapter, VintedAdapter};
pub use traits::{ListingItem, PlatformAdapter};
