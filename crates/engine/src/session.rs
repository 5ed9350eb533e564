//! The per-page filtering session.
//!
//! A `FilterSession` is the record of the last successful `apply_filters`:
//! which items were sent, what the API said about them, the current
//! threshold, and which elements the engine has hidden. The hidden set is
//! what makes a reset exact.

use crate::threshold::{count_visible, evaluate};
use analyze_client::{AnalysisResult, FilterMatches};
use dom::{Badge, ElementId, Page};
use platforms::PlatformAdapter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::filter_spec::FilterSpec;

/// Result of an apply or re-threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSummary {
    /// Items with a verdict that meet the threshold
    pub matched: usize,
    /// Items sent for analysis
    pub total: usize,
}

/// Read-only view for a control surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub is_applied: bool,
    pub matched: usize,
    pub total: usize,
}

/// One item of the session, in the order it was sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionItem {
    pub element: ElementId,
    pub url: Url,
    /// Element carrying the badges, once rendered
    pub anchor: Option<ElementId>,
}

#[derive(Debug, Clone)]
pub struct FilterSession {
    pub platform: String,
    pub page_url: Url,
    pub filters: FilterSpec,
    pub items: Vec<SessionItem>,
    /// Aligned by position with `items`; may be shorter
    pub results: AnalysisResult,
    pub threshold: usize,
    pub max_items: usize,
    hidden: HashSet<ElementId>,
}

impl FilterSession {
    pub fn new(
        platform: impl Into<String>,
        page_url: Url,
        filters: FilterSpec,
        items: Vec<SessionItem>,
        results: AnalysisResult,
        threshold: usize,
        max_items: usize,
    ) -> Self {
        Self {
            platform: platform.into(),
            page_url,
            filters,
            items,
            results,
            threshold,
            max_items,
            hidden: HashSet::new(),
        }
    }

    pub fn summary(&self) -> FilterSummary {
        FilterSummary {
            matched: count_visible(self.verdicts().map(|(_, verdicts)| verdicts), self.threshold),
            total: self.items.len(),
        }
    }

    /// Elements currently hidden by this session
    pub fn hidden(&self) -> &HashSet<ElementId> {
        &self.hidden
    }

    /// Items paired with their verdicts. Items past the end of the results
    /// are left out.
    pub fn verdicts(&self) -> impl Iterator<Item = (&SessionItem, &FilterMatches)> {
        self.items.iter().zip(self.results.iter())
    }

    /// Attach badges to every item with a verdict, then apply visibility.
    ///
    /// Items whose element was removed by the page are skipped. When the
    /// picture area is missing or detached the badges go on the item itself.
    pub fn render<P: Page>(&mut self, adapter: &dyn PlatformAdapter, page: &mut P) -> FilterSummary {
        for (index, item) in self.items.iter_mut().enumerate() {
            let Some(verdicts) = self.results.get(index) else {
                break;
            };
            if !page.is_connected(item.element) {
                debug!("Item {} is no longer in the page, skipping", item.url);
                continue;
            }

            let anchor = adapter
                .media_container(&*page, item.element)
                .filter(|media| page.is_connected(*media))
                .unwrap_or(item.element);
            if page.attach_badges(anchor, badges_for(&self.filters, verdicts)) {
                item.anchor = Some(anchor);
            }
        }
        self.apply_visibility(page)
    }

    /// Show or hide every item with a verdict according to the threshold.
    /// Badges are left as they are.
    pub fn apply_visibility<P: Page>(&mut self, page: &mut P) -> FilterSummary {
        for (item, verdicts) in self.items.iter().zip(self.results.iter()) {
            let element = item.element;
            if !page.is_connected(element) {
                self.hidden.remove(&element);
                continue;
            }

            if evaluate(verdicts, self.threshold).visible {
                if self.hidden.remove(&element) {
                    page.set_hidden(element, false);
                }
            } else if page.set_hidden(element, true) {
                self.hidden.insert(element);
            }
        }
        self.summary()
    }

    /// Undo every marker this session put on the page.
    pub fn revert<P: Page>(&mut self, page: &mut P) {
        for element in self.hidden.drain() {
            page.set_hidden(element, false);
        }
        let cleared = page.clear_badges();
        debug!("Reverted session on {} ({} badge anchors cleared)", self.page_url, cleared);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            platform: self.platform.clone(),
            page_url: self.page_url.to_string(),
            filters: self.filters.to_vec(),
            threshold: self.threshold,
            max_items: self.max_items,
            items: self
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| SnapshotItem {
                    url: item.url.to_string(),
                    verdicts: self.results.get(index).cloned(),
                })
                .collect(),
        }
    }
}

/// Badges in the order the user wrote the filters; verdicts for filters
/// the engine did not send are appended in name order.
fn badges_for(filters: &FilterSpec, verdicts: &FilterMatches) -> Vec<Badge> {
    let mut badges: Vec<Badge> = filters
        .iter()
        .filter_map(|f| verdicts.get(f).map(|&matched| Badge::new(f, matched)))
        .collect();

    let mut extra: Vec<(&String, &bool)> = verdicts
        .iter()
        .filter(|(f, _)| !filters.as_slice().contains(f))
        .collect();
    extra.sort();
    badges.extend(extra.into_iter().map(|(f, &matched)| Badge::new(f.as_str(), matched)));
    badges
}

// =============================================================================
// Persisted hand-off
// =============================================================================

/// Serialisable copy of a session, for a control surface to persist and
/// restore a summary without re-querying the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub platform: String,
    pub page_url: String,
    pub filters: Vec<String>,
    pub threshold: usize,
    pub max_items: usize,
    pub items: Vec<SnapshotItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub url: String,
    /// `None` when the API returned no verdict for this item
    pub verdicts: Option<FilterMatches>,
}

impl SessionSnapshot {
    pub fn summary(&self) -> FilterSummary {
        self.summary_at(self.threshold)
    }

    /// Summary under another threshold, computed offline.
    pub fn summary_at(&self, threshold: usize) -> FilterSummary {
        FilterSummary {
            matched: count_visible(self.items.iter().filter_map(|i| i.verdicts.as_ref()), threshold),
            total: self.items.len(),
        }
    }
}
