//! Headless page built from an HTML snapshot.
//!
//! `HtmlPage` keeps the raw markup and re-parses it with `scraper` for each
//! query. Element handles are positions in a document-order walk of the
//! parsed tree, which is deterministic for a given source, so handles stay
//! valid across re-parses.
//!
//! Engine markers (hidden state, badges) are kept as an overlay next to the
//! markup rather than written into it. Node removal by page scripts is
//! simulated with [`HtmlPage::remove_element`].

use crate::error::{DomError, Result};
use crate::types::{Badge, ElementId, Page};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use url::Url;

/// In-memory [`Page`] implementation over an HTML document.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: Url,
    source: String,
    element_count: usize,
    detached: HashSet<ElementId>,
    hidden: HashSet<ElementId>,
    badges: BTreeMap<ElementId, Vec<Badge>>,
}

impl HtmlPage {
    /// Build a page from its address and markup.
    pub fn new(url: Url, source: impl Into<String>) -> Self {
        let source = source.into();
        let element_count = elements(&Html::parse_document(&source)).len();
        debug!("Loaded page {} with {} elements", url, element_count);
        Self {
            url,
            source,
            element_count,
            detached: HashSet::new(),
            hidden: HashSet::new(),
            badges: BTreeMap::new(),
        }
    }

    /// Detach an element and its whole subtree, the way a page script
    /// removing the node would. Markers on detached nodes are dropped.
    pub fn remove_element(&mut self, element: ElementId) -> Result<()> {
        let html = Html::parse_document(&self.source);
        let all = elements(&html);
        let target = all
            .get(element.0)
            .ok_or(DomError::UnknownElement(element.0))?;

        for id in subtree(element, target) {
            self.hidden.remove(&id);
            self.badges.remove(&id);
            self.detached.insert(id);
        }
        Ok(())
    }

    /// Number of elements currently carrying the hidden marker
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    /// Number of elements currently carrying badges
    pub fn badge_count(&self) -> usize {
        self.badges.len()
    }

    /// Run `f` against the parsed element at `element`, if it is connected.
    fn with_element<R>(&self, element: ElementId, f: impl FnOnce(ElementRef<'_>) -> R) -> Option<R> {
        if !self.is_connected(element) {
            return None;
        }
        let html = Html::parse_document(&self.source);
        let all = elements(&html);
        all.get(element.0).copied().map(f)
    }
}

impl Page for HtmlPage {
    fn url(&self) -> &Url {
        &self.url
    }

    fn select(&self, selector: &str) -> Result<Vec<ElementId>> {
        let selector = parse_selector(selector)?;
        let html = Html::parse_document(&self.source);

        Ok(elements(&html)
            .iter()
            .enumerate()
            .filter(|(_, e)| selector.matches(*e))
            .map(|(i, _)| ElementId(i))
            .filter(|id| self.is_connected(*id))
            .collect())
    }

    fn select_within(&self, scope: ElementId, selector: &str) -> Result<Option<ElementId>> {
        let selector = parse_selector(selector)?;
        if !self.is_connected(scope) {
            return Ok(None);
        }

        let html = Html::parse_document(&self.source);
        let all = elements(&html);
        let Some(root) = all.get(scope.0) else {
            return Err(DomError::UnknownElement(scope.0));
        };

        Ok(subtree(scope, root)
            .skip(1)
            .filter(|id| selector.matches(&all[id.0]))
            .find(|id| self.is_connected(*id)))
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.with_element(element, |e| e.value().attr(name).map(str::to_string))
            .flatten()
    }

    fn outer_html(&self, element: ElementId) -> Option<String> {
        self.with_element(element, |e| e.html())
    }

    fn is_connected(&self, element: ElementId) -> bool {
        element.0 < self.element_count && !self.detached.contains(&element)
    }

    fn set_hidden(&mut self, element: ElementId, hidden: bool) -> bool {
        if !self.is_connected(element) {
            return false;
        }
        if hidden {
            self.hidden.insert(element);
        } else {
            self.hidden.remove(&element);
        }
        true
    }

    fn is_hidden(&self, element: ElementId) -> bool {
        self.hidden.contains(&element)
    }

    fn attach_badges(&mut self, anchor: ElementId, badges: Vec<Badge>) -> bool {
        if !self.is_connected(anchor) {
            return false;
        }
        self.badges.insert(anchor, badges);
        true
    }

    fn badges(&self, element: ElementId) -> Vec<Badge> {
        self.badges.get(&element).cloned().unwrap_or_default()
    }

    fn clear_badges(&mut self) -> usize {
        let cleared = self.badges.len();
        self.badges.clear();
        cleared
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Every element of the document in document order, the root included.
fn elements(html: &Html) -> Vec<ElementRef<'_>> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

/// Handles of `root` and its descendants. A preorder walk keeps a subtree
/// contiguous, so the range starts at the root's own position.
fn subtree(id: ElementId, root: &ElementRef<'_>) -> impl Iterator<Item = ElementId> {
    let size = root.descendants().filter_map(ElementRef::wrap).count();
    (id.0..id.0 + size).map(ElementId)
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| DomError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
