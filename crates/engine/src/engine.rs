//! # Filter Engine
//!
//! Owns the filtering lifecycle of one page:
//! 1. Validate the filter set
//! 2. Resolve the platform adapter and revert the previous session
//! 3. Collect usable items (`Collecting`)
//! 4. Fetch per-item HTML concurrently, then send one batched analyze call
//!    (`Querying`)
//! 5. Render badges and visibility (`Applied`)
//!
//! Re-thresholding works on the stored results and never touches the
//! network. Any failure leaves the engine `Idle` with no session.

use std::sync::Arc;
use std::time::Instant;

use analyze_client::{AnalysisResult, AnalyzeItem, AnalyzeRequest, Analyzer};
use dom::Page;
use futures::stream::{self, StreamExt};
use platforms::{HtmlFetcher, ListingItem, PlatformAdapter, PlatformRegistry};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::FilterError;
use crate::filter_spec::FilterSpec;
use crate::session::{FilterSession, FilterSummary, SessionItem, SessionSnapshot, SessionSummary};

/// Tuning knobs for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on in-flight item page fetches
    pub fetch_concurrency: usize,
    /// Capacity of the bridge command channel
    pub bridge_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 8,
            bridge_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    Idle,
    Collecting,
    Querying,
    Applied,
}

/// Input of `apply_filters`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub filters: Vec<String>,
    pub max_items: usize,
    pub threshold: usize,
}

impl ApplyRequest {
    pub fn new<I, S>(filters: I, max_items: usize, threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filters: filters.into_iter().map(Into::into).collect(),
            max_items,
            threshold,
        }
    }
}

pub struct FilterEngine {
    registry: PlatformRegistry,
    analyzer: Arc<dyn Analyzer>,
    fetcher: Arc<dyn HtmlFetcher>,
    config: EngineConfig,
    phase: EnginePhase,
    session: Option<FilterSession>,
}

impl FilterEngine {
    pub fn new(
        registry: PlatformRegistry,
        analyzer: Arc<dyn Analyzer>,
        fetcher: Arc<dyn HtmlFetcher>,
    ) -> Self {
        Self::with_config(registry, analyzer, fetcher, EngineConfig::default())
    }

    pub fn with_config(
        registry: PlatformRegistry,
        analyzer: Arc<dyn Analyzer>,
        fetcher: Arc<dyn HtmlFetcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            analyzer,
            fetcher,
            config,
            phase: EnginePhase::Idle,
            session: None,
        }
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn session(&self) -> Option<&FilterSession> {
        self.session.as_ref()
    }

    /// Run the whole filtering pipeline on `page`.
    ///
    /// The previous session is reverted before any item is collected. When
    /// `cancel` fires while the engine is waiting on the network, the call
    /// returns `Cancelled` without writing to the page.
    #[instrument(skip_all, fields(page = %page.url(), max_items = request.max_items, threshold = request.threshold))]
    pub async fn apply_filters<P: Page>(
        &mut self,
        page: &mut P,
        request: ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<FilterSummary, FilterError> {
        let start_time = Instant::now();

        let filters = FilterSpec::new(request.filters)?;
        let page_url = page.url().clone();
        let adapter = self
            .registry
            .resolve(&page_url)
            .ok_or_else(|| FilterError::UnsupportedPage {
                url: page_url.to_string(),
            })?;

        self.reset_filters(page);

        self.set_phase(EnginePhase::Collecting);
        let items = collect_items(adapter.as_ref(), &*page, request.max_items);
        if items.is_empty() {
            self.set_phase(EnginePhase::Idle);
            return Err(FilterError::NoItemsFound {
                platform: adapter.name().to_string(),
            });
        }
        info!("Collected {} {} items", items.len(), adapter.name());

        self.set_phase(EnginePhase::Querying);
        let mut results = match self.query(adapter.as_ref(), &items, &filters, cancel).await {
            Ok(results) => results,
            Err(e) => {
                self.set_phase(EnginePhase::Idle);
                return Err(e);
            }
        };
        if results.len() > items.len() {
            warn!(
                "Dropping {} verdicts beyond the {} items sent",
                results.len() - items.len(),
                items.len()
            );
            results.truncate(items.len());
        }

        let session_items = items
            .into_iter()
            .map(|item| SessionItem {
                element: item.element,
                url: item.url,
                anchor: None,
            })
            .collect();
        let mut session = FilterSession::new(
            adapter.name(),
            page_url,
            filters,
            session_items,
            results,
            request.threshold,
            request.max_items,
        );
        let summary = session.render(adapter.as_ref(), page);
        self.session = Some(session);
        self.set_phase(EnginePhase::Applied);

        info!(
            "Applied filters: {}/{} items visible in {:.2?}",
            summary.matched,
            summary.total,
            start_time.elapsed()
        );
        Ok(summary)
    }

    /// Recompute visibility of the current session under a new threshold.
    pub fn update_threshold<P: Page>(
        &mut self,
        page: &mut P,
        threshold: usize,
    ) -> Result<FilterSummary, FilterError> {
        let session = self.session.as_mut().ok_or(FilterError::NoActiveSession)?;
        session.threshold = threshold;
        let summary = session.apply_visibility(page);
        debug!(
            "Threshold {}: {}/{} items visible",
            threshold, summary.matched, summary.total
        );
        Ok(summary)
    }

    /// Revert every marker and drop the session. Safe to call at any time.
    pub fn reset_filters<P: Page>(&mut self, page: &mut P) {
        match self.session.take() {
            Some(mut session) => session.revert(page),
            None => {
                page.clear_badges();
            }
        }
        self.set_phase(EnginePhase::Idle);
    }

    pub fn session_summary(&self) -> SessionSummary {
        match &self.session {
            Some(session) => {
                let summary = session.summary();
                SessionSummary {
                    is_applied: true,
                    matched: summary.matched,
                    total: summary.total,
                }
            }
            None => SessionSummary::default(),
        }
    }

    /// Serialisable copy of the current session, for persistence.
    pub fn session_snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(FilterSession::snapshot)
    }

    /// HTML fan-out followed by the single analyze call. Both waits observe
    /// `cancel`.
    async fn query(
        &self,
        adapter: &dyn PlatformAdapter,
        items: &[ListingItem],
        filters: &FilterSpec,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, FilterError> {
        let html = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FilterError::Cancelled),
            html = self.fetch_all_html(adapter, items) => html,
        };

        let request = AnalyzeRequest {
            items: items
                .iter()
                .zip(html)
                .map(|(item, html)| AnalyzeItem {
                    platform: adapter.name().to_string(),
                    url: item.url.to_string(),
                    html,
                })
                .collect(),
            filters: filters.to_vec(),
        };

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FilterError::Cancelled),
            results = self.analyzer.analyze(&request) => results,
        };
        results.map_err(|e| {
            warn!("Analysis failed: {}", e);
            FilterError::from(e)
        })
    }

    /// Item HTML in item order. Waits for every fetch to settle.
    async fn fetch_all_html(&self, adapter: &dyn PlatformAdapter, items: &[ListingItem]) -> Vec<String> {
        let fetcher = self.fetcher.as_ref();
        let fetches: Vec<_> = items.iter().map(|item| adapter.item_html(item, fetcher)).collect();
        let html: Vec<String> = stream::iter(fetches)
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let empty = html.iter().filter(|h| h.is_empty()).count();
        if empty > 0 {
            debug!("{} of {} items sent without HTML", empty, html.len());
        }
        html
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        if self.phase != phase {
            debug!("Engine phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

/// The first `max_items` containers that yield a URL, in document order.
fn collect_items(adapter: &dyn PlatformAdapter, page: &dyn Page, max_items: usize) -> Vec<ListingItem> {
    let mut items = Vec::new();
    if max_items == 0 {
        return items;
    }

    for element in adapter.item_elements(page) {
        let Some(url) = adapter.item_url(page, element) else {
            continue;
        };
        items.push(ListingItem {
            element,
            url,
            markup: page.outer_html(element).unwrap_or_default(),
        });
        if items.len() == max_items {
            break;
        }
    }
    items
}
