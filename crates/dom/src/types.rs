//! Core page types shared by every crate in the workspace.
//!
//! The filtering engine never talks to a concrete document. It works
//! against the [`Page`] trait, which covers the handful of queries and
//! mutations the engine needs:
//! - enumerate elements with a CSS selector
//! - read attributes and markup of an element
//! - toggle the hidden marker of an element
//! - attach and remove badge annotations

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// =============================================================================
// Element handles
// =============================================================================

/// Opaque handle to an element of a page.
///
/// Handles are only meaningful for the page that produced them. A handle
/// may outlive its element: the page's own scripts can remove nodes at any
/// time, so callers check [`Page::is_connected`] before relying on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Annotations
// =============================================================================

/// A per-filter annotation shown next to an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Badge {
    /// The filter description, as authored by the user
    pub filter: String,
    /// Whether the item matched this filter
    pub matched: bool,
}

impl Badge {
    pub fn new(filter: impl Into<String>, matched: bool) -> Self {
        Self {
            filter: filter.into(),
            matched,
        }
    }

    /// The glyph shown in front of the description.
    pub fn symbol(&self) -> &'static str {
        if self.matched { "✓" } else { "✗" }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol(), self.filter)
    }
}

// =============================================================================
// Page contract
// =============================================================================

/// The document the engine reads from and annotates.
///
/// Mutations are limited to two engine-owned markers (hidden state and
/// badges). Elements are never removed by the engine, so every mutation is
/// reversible. Mutating a detached element is a no-op that returns `false`.
pub trait Page: Send + Sync {
    /// Address of the page
    fn url(&self) -> &Url;

    /// All connected elements matching `selector`, in document order.
    fn select(&self, selector: &str) -> Result<Vec<ElementId>>;

    /// First descendant of `scope` matching `selector` (the scope itself is
    /// not considered).
    fn select_within(&self, scope: ElementId, selector: &str) -> Result<Option<ElementId>>;

    /// Value of an attribute, if the element is connected and carries it.
    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    /// Serialized markup of the element, including itself.
    fn outer_html(&self, element: ElementId) -> Option<String>;

    /// Whether the element is still part of the document.
    fn is_connected(&self, element: ElementId) -> bool;

    /// Set or clear the hidden marker. Returns `false` for detached elements.
    fn set_hidden(&mut self, element: ElementId, hidden: bool) -> bool;

    fn is_hidden(&self, element: ElementId) -> bool;

    /// Attach badges to `anchor`, replacing any badges already there.
    /// Returns `false` for detached elements.
    fn attach_badges(&mut self, anchor: ElementId, badges: Vec<Badge>) -> bool;

    /// Badges currently attached to the element.
    fn badges(&self, element: ElementId) -> Vec<Badge>;

    /// Remove every badge from the page, returning how many anchors carried
    /// badges.
    fn clear_badges(&mut self) -> usize;
}
