//! # Dom Crate
//!
//! Page abstraction used by the listing filter engine.
//!
//! ## Main Components
//!
//! - **types**: `Page` trait, `ElementId` handles and `Badge` annotations
//! - **html_page**: `HtmlPage`, a headless page over an HTML snapshot
//! - **error**: Error types for page queries
//!
//! ## Example Usage
//!
//! ```ignore
//! use dom::{HtmlPage, Page};
//!
//! let page = HtmlPage::new(url, markup);
//! for item in page.select("li.result")? {
//!     println!("{:?}", page.attribute(item, "href"));
//! }
//! ```

pub mod error;
pub mod html_page;
pub mod types;

pub use error::{DomError, Result};
pub use html_page::HtmlPage;
pub use types::{Badge, ElementId, Page};
