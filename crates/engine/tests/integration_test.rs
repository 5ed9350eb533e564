//! Integration tests for the filter engine.
//!
//! Most tests drive a vinted search page held in an `HtmlPage` with a fake
//! analyzer and fetcher that count their calls. The last test runs the
//! real HTTP client and fetcher against a wiremock server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use analyze_client::{
    AnalysisResult, AnalyzeClient, AnalyzeClientError, AnalyzeRequest, Analyzer, ClientConfig, FilterMatches,
};
use async_trait::async_trait;
use dom::{Badge, ElementId, HtmlPage, Page};
use engine::{
    spawn_engine, ApplyRequest, Command, EnginePhase, FilterEngine, FilterError, FilterSummary, Reply,
    SessionSummary,
};
use platforms::{FetcherConfig, HtmlFetcher, HtmlSource, HttpFetcher, PlatformAdapter, PlatformRegistry, SiteDescriptor};
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

const FILTERS: [&str; 2] = ["good condition", "good price"];

const VINTED_SEARCH: &str = r#"
<html><body>
  <div class="feed-grid">
    <div data-testid="grid-item">
      <div class="new-item-box__image"><img src="1.jpg"></div>
      <a href="/items/1-chaise">Chaise</a>
    </div>
    <div data-testid="grid-item"><span>Sponsored</span></div>
    <div data-testid="grid-item">
      <div class="new-item-box__image"><img src="2.jpg"></div>
      <a href="/items/2-table">Table</a>
    </div>
    <div data-testid="grid-item">
      <div class="new-item-box__image"><img src="3.jpg"></div>
      <a href="/items/3-lampe">Lampe</a>
    </div>
  </div>
</body></html>
"#;

// =============================================================================
// Fakes
// =============================================================================

fn verdicts(condition: bool, price: bool) -> FilterMatches {
    [("good condition".to_string(), condition), ("good price".to_string(), price)].into()
}

/// The three verdicts of the reference scenario: {T,F}, {T,T}, {F,F}
fn scenario_results() -> AnalysisResult {
    vec![verdicts(true, false), verdicts(true, true), verdicts(false, false)]
}

struct FakeAnalyzer {
    response: Mutex<Result<AnalysisResult, AnalyzeClientError>>,
    calls: AtomicUsize,
    last_request: Mutex<Option<AnalyzeRequest>>,
    on_call: Option<Arc<AtomicBool>>,
}

impl FakeAnalyzer {
    fn returning(results: AnalysisResult) -> Self {
        Self {
            response: Mutex::new(Ok(results)),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            on_call: None,
        }
    }

    fn fail_from_now_on(&self, status: u16, message: &str) {
        *self.response.lock().unwrap() = Err(AnalyzeClientError::Http {
            status,
            message: message.to_string(),
        });
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> AnalyzeRequest {
        self.last_request.lock().unwrap().clone().expect("no analyze call recorded")
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalyzeClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(flag) = &self.on_call {
            flag.store(true, Ordering::SeqCst);
        }
        self.response.lock().unwrap().clone()
    }
}

/// Parks the first analyze call until it is cancelled; later calls answer.
struct StallFirstAnalyzer {
    results: AnalysisResult,
    calls: AtomicUsize,
    entered: Arc<Notify>,
}

#[async_trait]
impl Analyzer for StallFirstAnalyzer {
    async fn analyze(&self, _request: &AnalyzeRequest) -> Result<AnalysisResult, AnalyzeClientError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
        Ok(self.results.clone())
    }
}

#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
    failing: Vec<String>,
}

impl FakeFetcher {
    fn failing_on(path: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: vec![path.to_string()],
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HtmlFetcher for FakeFetcher {
    async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|p| url.path() == p) {
            anyhow::bail!("timed out fetching {url}");
        }
        Ok(format!("<main>{}</main>", url.path()))
    }
}

fn vinted_page() -> HtmlPage {
    HtmlPage::new(
        Url::parse("https://www.vinted.fr/catalog?search_text=chaise").unwrap(),
        VINTED_SEARCH,
    )
}

fn engine_with(analyzer: Arc<dyn Analyzer>, fetcher: Arc<dyn HtmlFetcher>) -> FilterEngine {
    FilterEngine::new(PlatformRegistry::builtin().unwrap(), analyzer, fetcher)
}

fn item_elements(page: &HtmlPage) -> Vec<ElementId> {
    PlatformRegistry::builtin()
        .unwrap()
        .resolve(page.url())
        .unwrap()
        .item_elements(page)
}

// =============================================================================
// applyFilters / updateThreshold / resetFilters
// =============================================================================

#[tokio::test]
async fn test_reference_scenario_then_rethreshold() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let fetcher = Arc::new(FakeFetcher::default());
    let mut engine = engine_with(analyzer.clone(), fetcher.clone());
    let mut page = vinted_page();

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary, FilterSummary { matched: 2, total: 3 });
    assert_eq!(engine.phase(), EnginePhase::Applied);

    // Items 1 and 2 visible, item 3 hidden, badges on all three
    let elements = item_elements(&page);
    let (first, third, fourth) = (elements[0], elements[2], elements[3]);
    assert!(!page.is_hidden(first));
    assert!(!page.is_hidden(third));
    assert!(page.is_hidden(fourth));
    assert_eq!(page.hidden_count(), 1);
    assert_eq!(page.badge_count(), 3);

    let media = engine.registry().get("vinted").unwrap().media_container(&page, first).unwrap();
    assert_eq!(
        page.badges(media),
        vec![Badge::new("good condition", true), Badge::new("good price", false)]
    );

    // One batched request, HTML fetched once per item
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(fetcher.calls(), 3);
    let request = analyzer.last_request();
    assert_eq!(request.filters, FILTERS.to_vec());
    let urls: Vec<&str> = request.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.vinted.fr/items/1-chaise",
            "https://www.vinted.fr/items/2-table",
            "https://www.vinted.fr/items/3-lampe",
        ]
    );
    assert!(request.items.iter().all(|i| i.platform == "vinted"));
    assert_eq!(request.items[1].html, "<main>/items/2-table</main>");

    // Re-threshold without touching the network
    let summary = engine.update_threshold(&mut page, 2).unwrap();
    assert_eq!(summary, FilterSummary { matched: 1, total: 3 });
    assert!(page.is_hidden(first));
    assert!(!page.is_hidden(third));
    assert_eq!(page.badge_count(), 3);
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(fetcher.calls(), 3);

    // And back down: hidden items are revealed again
    let summary = engine.update_threshold(&mut page, 0).unwrap();
    assert_eq!(summary.matched, 3);
    assert_eq!(page.hidden_count(), 0);
}

#[tokio::test]
async fn test_summary_after_apply_counts_usable_items_only() {
    let analyzer = Arc::new(FakeAnalyzer::returning(vec![verdicts(true, true), verdicts(false, true)]));
    let mut engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();

    assert_eq!(engine.session_summary(), SessionSummary::default());

    engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 2, 2), &CancellationToken::new())
        .await
        .unwrap();

    // The sponsored tile has no item link and does not use up the budget
    assert_eq!(
        engine.session_summary(),
        SessionSummary {
            is_applied: true,
            matched: 1,
            total: 2
        }
    );
    assert_eq!(analyzer.last_request().items[1].url, "https://www.vinted.fr/items/2-table");
}

#[tokio::test]
async fn test_threshold_above_filter_count_keeps_fully_matched_items() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let mut engine = engine_with(analyzer, Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 7), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.matched, 1);
    assert!(!page.is_hidden(item_elements(&page)[2]));
}

#[tokio::test]
async fn test_rethreshold_above_filter_count_is_clamped() {
    let mut engine = engine_with(
        Arc::new(FakeAnalyzer::returning(scenario_results())),
        Arc::new(FakeFetcher::default()),
    );
    let mut page = vinted_page();
    engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 0), &CancellationToken::new())
        .await
        .unwrap();

    let summary = engine.update_threshold(&mut page, 7).unwrap();
    assert_eq!(summary, FilterSummary { matched: 1, total: 3 });
    let elements = item_elements(&page);
    assert!(!page.is_hidden(elements[2]));
    assert!(page.is_hidden(elements[0]));
    assert!(page.is_hidden(elements[3]));
}

#[tokio::test]
async fn test_rethreshold_sweep_never_increases_matches() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let mut engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();
    engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 0), &CancellationToken::new())
        .await
        .unwrap();

    let matched: Vec<usize> = (0..=3)
        .map(|t| engine.update_threshold(&mut page, t).unwrap().matched)
        .collect();
    assert_eq!(matched, vec![3, 2, 1, 1]);
    assert!(matched.windows(2).all(|w| w[0] >= w[1]), "{matched:?}");
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_extra_verdicts_are_dropped() {
    let mut results = scenario_results();
    results.extend([verdicts(true, true), verdicts(true, true)]);
    let mut engine = engine_with(Arc::new(FakeAnalyzer::returning(results)), Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary, FilterSummary { matched: 2, total: 3 });
    assert_eq!(engine.session().unwrap().results.len(), 3);

    let live = engine.session_summary();
    let stored = engine.session_snapshot().unwrap().summary();
    assert_eq!((live.matched, live.total), (stored.matched, stored.total));
}

#[tokio::test]
async fn test_reset_twice_leaves_no_markers() {
    let mut engine = engine_with(
        Arc::new(FakeAnalyzer::returning(scenario_results())),
        Arc::new(FakeFetcher::default()),
    );
    let mut page = vinted_page();
    engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(page.hidden_count(), 2);

    engine.reset_filters(&mut page);
    assert_eq!((page.hidden_count(), page.badge_count()), (0, 0));
    assert_eq!(engine.phase(), EnginePhase::Idle);

    engine.reset_filters(&mut page);
    assert_eq!((page.hidden_count(), page.badge_count()), (0, 0));
    assert!(!engine.session_summary().is_applied);
    assert_eq!(engine.update_threshold(&mut page, 1), Err(FilterError::NoActiveSession));
}

#[tokio::test]
async fn test_update_threshold_without_session() {
    let mut engine = engine_with(
        Arc::new(FakeAnalyzer::returning(Vec::new())),
        Arc::new(FakeFetcher::default()),
    );
    let mut page = vinted_page();
    assert_eq!(engine.update_threshold(&mut page, 1), Err(FilterError::NoActiveSession));
}

#[tokio::test]
async fn test_empty_filters_make_no_calls() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let fetcher = Arc::new(FakeFetcher::default());
    let mut engine = engine_with(analyzer.clone(), fetcher.clone());
    let mut page = vinted_page();

    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(["  ", ""], 20, 1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, FilterError::EmptyFilterSpec);
    assert_eq!(analyzer.calls(), 0);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_empty_filters_keep_previous_session() {
    let mut engine = engine_with(
        Arc::new(FakeAnalyzer::returning(scenario_results())),
        Arc::new(FakeFetcher::default()),
    );
    let mut page = vinted_page();
    engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap();

    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(Vec::<String>::new(), 20, 1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, FilterError::EmptyFilterSpec);
    assert!(engine.session_summary().is_applied);
    assert_eq!(page.hidden_count(), 1);
}

#[tokio::test]
async fn test_unsupported_page_is_left_alone() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let mut engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let mut page = HtmlPage::new(
        Url::parse("https://www.ebay.fr/sch/i.html?_nkw=chaise").unwrap(),
        VINTED_SEARCH,
    );

    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::UnsupportedPage { ref url } if url.contains("ebay.fr")));
    assert_eq!((page.hidden_count(), page.badge_count()), (0, 0));
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn test_no_items_found() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let mut engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let mut page = HtmlPage::new(
        Url::parse("https://www.vinted.fr/catalog").unwrap(),
        "<html><body><p>Aucun résultat</p></body></html>",
    );

    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FilterError::NoItemsFound {
            platform: "vinted".into()
        }
    );
    assert_eq!(analyzer.calls(), 0);
    assert_eq!(engine.phase(), EnginePhase::Idle);

    // A zero item budget is treated the same way
    let mut page = vinted_page();
    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 0, 1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::NoItemsFound { .. }));
}

#[tokio::test]
async fn test_api_failure_reverts_previous_session() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let mut engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();
    engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(page.hidden_count(), 2);

    analyzer.fail_from_now_on(503, "model overloaded");
    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FilterError::AnalysisApiError {
            status: Some(503),
            message: "model overloaded".into()
        }
    );
    assert_eq!((page.hidden_count(), page.badge_count()), (0, 0));
    assert!(!engine.session_summary().is_applied);
    assert_eq!(engine.phase(), EnginePhase::Idle);
    assert_eq!(analyzer.calls(), 2);
}

#[tokio::test]
async fn test_failed_fetch_degrades_to_empty_html() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let fetcher = Arc::new(FakeFetcher::failing_on("/items/2-table"));
    let mut engine = engine_with(analyzer.clone(), fetcher.clone());
    let mut page = vinted_page();

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(analyzer.calls(), 1);

    let html: Vec<String> = analyzer.last_request().items.into_iter().map(|i| i.html).collect();
    assert_eq!(html, vec!["<main>/items/1-chaise</main>", "", "<main>/items/3-lampe</main>"]);
}

#[tokio::test]
async fn test_items_without_verdict_are_untouched() {
    let analyzer = Arc::new(FakeAnalyzer::returning(vec![verdicts(false, false), verdicts(true, true)]));
    let mut engine = engine_with(analyzer, Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary, FilterSummary { matched: 1, total: 3 });

    let elements = item_elements(&page);
    let last = elements[3];
    assert!(page.is_hidden(elements[0]));
    assert!(!page.is_hidden(last));
    assert_eq!(page.badge_count(), 2);
    let media = engine.registry().get("vinted").unwrap().media_container(&page, last).unwrap();
    assert!(page.badges(media).is_empty());
}

/// Delegates to an `HtmlPage` but reports one element as removed once a
/// flag is raised, the way a page script could drop it mid-flight.
struct VanishingPage {
    inner: HtmlPage,
    victim: Vec<ElementId>,
    gone: Arc<AtomicBool>,
}

impl VanishingPage {
    fn vanished(&self, element: ElementId) -> bool {
        self.gone.load(Ordering::SeqCst) && self.victim.contains(&element)
    }
}

impl Page for VanishingPage {
    fn url(&self) -> &Url {
        self.inner.url()
    }

    fn select(&self, selector: &str) -> dom::Result<Vec<ElementId>> {
        self.inner.select(selector)
    }

    fn select_within(&self, scope: ElementId, selector: &str) -> dom::Result<Option<ElementId>> {
        self.inner.select_within(scope, selector)
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.inner.attribute(element, name)
    }

    fn outer_html(&self, element: ElementId) -> Option<String> {
        self.inner.outer_html(element)
    }

    fn is_connected(&self, element: ElementId) -> bool {
        !self.vanished(element) && self.inner.is_connected(element)
    }

    fn set_hidden(&mut self, element: ElementId, hidden: bool) -> bool {
        !self.vanished(element) && self.inner.set_hidden(element, hidden)
    }

    fn is_hidden(&self, element: ElementId) -> bool {
        self.inner.is_hidden(element)
    }

    fn attach_badges(&mut self, anchor: ElementId, badges: Vec<Badge>) -> bool {
        !self.vanished(anchor) && self.inner.attach_badges(anchor, badges)
    }

    fn badges(&self, element: ElementId) -> Vec<Badge> {
        self.inner.badges(element)
    }

    fn clear_badges(&mut self) -> usize {
        self.inner.clear_badges()
    }
}

#[tokio::test]
async fn test_items_removed_during_query_are_skipped() {
    let inner = vinted_page();
    let elements = item_elements(&inner);
    let victim = elements[3];
    let victim_media = inner.select_within(victim, ".new-item-box__image").unwrap().unwrap();

    let gone = Arc::new(AtomicBool::new(false));
    let mut page = VanishingPage {
        inner,
        victim: vec![victim, victim_media],
        gone: gone.clone(),
    };
    let analyzer = Arc::new(FakeAnalyzer {
        on_call: Some(gone),
        ..FakeAnalyzer::returning(scenario_results())
    });
    let mut engine = engine_with(analyzer, Arc::new(FakeFetcher::default()));

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total, 3);

    // The vanished item would have been hidden; it is skipped instead
    assert_eq!(page.inner.hidden_count(), 0);
    assert_eq!(page.inner.badge_count(), 2);
    assert!(engine.session().unwrap().hidden().is_empty());
}

#[tokio::test]
async fn test_cancelled_apply_writes_nothing() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let mut engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let mut page = vinted_page();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 20, 1), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, FilterError::Cancelled);
    assert_eq!(analyzer.calls(), 0);
    assert_eq!((page.hidden_count(), page.badge_count()), (0, 0));
    assert!(engine.session().is_none());
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

// =============================================================================
// Bridge
// =============================================================================

fn apply_command(min_match: usize) -> Command {
    Command::ApplyFilters {
        active_filters: FILTERS.iter().map(|f| f.to_string()).collect(),
        min_match,
        max_items: 20,
    }
}

#[tokio::test]
async fn test_bridge_last_apply_wins() {
    let entered = Arc::new(Notify::new());
    let analyzer = Arc::new(StallFirstAnalyzer {
        results: scenario_results(),
        calls: AtomicUsize::new(0),
        entered: entered.clone(),
    });
    let engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let (handle, task) = spawn_engine(engine, vinted_page());

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.send(apply_command(1)).await }
    });
    entered.notified().await;

    let second = handle.send(apply_command(2)).await.unwrap().unwrap();
    assert_eq!(second, Reply::applied(FilterSummary { matched: 1, total: 3 }));

    let first = first.await.unwrap().unwrap().unwrap();
    assert!(!first.is_success());
    assert!(first.error().unwrap().contains("cancelled"));

    let summary = handle.send(Command::GetSessionSummary).await.unwrap().unwrap();
    assert_eq!(
        summary,
        Reply::summary(SessionSummary {
            is_applied: true,
            matched: 1,
            total: 3
        })
    );

    drop(handle);
    let (engine, page) = task.await.unwrap();
    assert_eq!(engine.phase(), EnginePhase::Applied);
    assert_eq!(page.hidden_count(), 2);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_bridge_fire_and_forget_commands_stay_ordered() {
    let analyzer = Arc::new(FakeAnalyzer::returning(scenario_results()));
    let engine = engine_with(analyzer.clone(), Arc::new(FakeFetcher::default()));
    let (handle, task) = spawn_engine(engine, vinted_page());

    let reply = handle.send(apply_command(1)).await.unwrap().unwrap();
    assert_eq!(reply, Reply::applied(FilterSummary { matched: 2, total: 3 }));

    let update: Command = serde_json::from_value(json!({"type": "UPDATE_MIN_MATCH", "minMatch": 2, "maxItems": 20})).unwrap();
    assert_eq!(handle.send(update).await.unwrap(), None);
    let summary = handle.send(Command::GetSessionSummary).await.unwrap().unwrap();
    assert_eq!(serde_json::to_value(&summary).unwrap(), json!({"success": true, "isApplied": true, "matched": 1, "total": 3}));

    assert_eq!(handle.send(Command::ResetFiltersOnPage).await.unwrap(), None);
    let summary = handle.send(Command::GetSessionSummary).await.unwrap().unwrap();
    assert_eq!(summary, Reply::summary(SessionSummary::default()));

    let vendor = handle.send(Command::GetVendorInfo).await.unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&vendor).unwrap(),
        json!({"success": true, "vendor": {"name": "vinted", "pageType": "search"}})
    );

    drop(handle);
    let (_, page) = task.await.unwrap();
    assert_eq!((page.hidden_count(), page.badge_count()), (0, 0));
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_bridge_reports_errors() {
    let engine = engine_with(
        Arc::new(FakeAnalyzer::returning(scenario_results())),
        Arc::new(FakeFetcher::default()),
    );
    let page = HtmlPage::new(Url::parse("https://example.org/").unwrap(), "<p></p>");
    let (handle, _task) = spawn_engine(engine, page);

    let vendor = handle.send(Command::GetVendorInfo).await.unwrap().unwrap();
    assert_eq!(vendor, Reply::unsupported());

    let reply = handle.send(apply_command(1)).await.unwrap().unwrap();
    assert_eq!(reply.error(), Some("Unsupported page: https://example.org/"));
}

// =============================================================================
// HTTP end to end
// =============================================================================

/// Listing served by the mock server itself, so item pages can be fetched.
struct LocalShopAdapter {
    descriptor: SiteDescriptor,
}

impl LocalShopAdapter {
    fn new() -> Self {
        let descriptor = SiteDescriptor::builder("localshop")
            .host(r"^127\.0\.0\.1$")
            .search_path(r"^/search")
            .item_path(r"^/p/\d+$")
            .item_selector("li.card")
            .media_selector("figure")
            .html_source(HtmlSource::FetchItemPage)
            .build()
            .unwrap();
        Self { descriptor }
    }
}

impl PlatformAdapter for LocalShopAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn item_url(&self, page: &dyn Page, element: ElementId) -> Option<Url> {
        let link = page.select_within(element, "a").ok()??;
        page.url().join(&page.attribute(link, "href")?).ok()
    }
}

#[tokio::test]
async fn test_http_end_to_end() {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    for id in 1..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/p/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<h1>Item {id}</h1>")))
            .expect(1)
            .mount(&server)
            .await;
    }

    let base = server.uri();
    let expected_request = json!({
        "items": [
            {"platform": "localshop", "url": format!("{base}/p/1"), "html": "<h1>Item 1</h1>"},
            {"platform": "localshop", "url": format!("{base}/p/2"), "html": "<h1>Item 2</h1>"},
            {"platform": "localshop", "url": format!("{base}/p/3"), "html": "<h1>Item 3</h1>"},
        ],
        "filters": ["good condition", "good price"],
    });
    Mock::given(method("POST"))
        .and(path("/items/analyze"))
        .and(header("X-API-Key", "secret"))
        .and(body_json(&expected_request))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filters": [
                {"good condition": true, "good price": false},
                {"good condition": true, "good price": true},
                {"good condition": false, "good price": false},
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalyzeClient::new(ClientConfig {
        endpoint: base.clone(),
        api_key: Some("secret".into()),
        ..ClientConfig::default()
    })
    .unwrap();
    let fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
    let registry = PlatformRegistry::new().with_adapter(LocalShopAdapter::new()).unwrap();
    let mut engine = FilterEngine::new(registry, Arc::new(client), Arc::new(fetcher));

    let listing = r#"
        <ul>
          <li class="card"><figure><img src="1.jpg"></figure><a href="/p/1">One</a></li>
          <li class="card"><figure><img src="2.jpg"></figure><a href="/p/2">Two</a></li>
          <li class="card"><figure><img src="3.jpg"></figure><a href="/p/3">Three</a></li>
        </ul>
    "#;
    let mut page = HtmlPage::new(Url::parse(&format!("{base}/search?q=chair")).unwrap(), listing);

    let summary = engine
        .apply_filters(&mut page, ApplyRequest::new(FILTERS, 10, 1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary, FilterSummary { matched: 2, total: 3 });

    let summary = engine.update_threshold(&mut page, 2).unwrap();
    assert_eq!(summary, FilterSummary { matched: 1, total: 3 });

    let snapshot = engine.session_snapshot().unwrap();
    assert_eq!(snapshot.platform, "localshop");
    assert_eq!(snapshot.threshold, 2);
    assert_eq!(snapshot.summary_at(1), FilterSummary { matched: 2, total: 3 });
}
