//! Benchmarks for re-thresholding
//!
//! Run with: cargo bench --package engine
//!
//! A threshold slider calls `update_threshold` on every tick, so it has to
//! stay cheap on a large results page.

use analyze_client::{AnalysisResult, AnalyzeClientError, AnalyzeRequest, Analyzer, FilterMatches};
use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dom::HtmlPage;
use engine::{ApplyRequest, FilterEngine};
use platforms::{HtmlFetcher, PlatformRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const ITEMS: usize = 200;
const FILTERS: [&str; 4] = ["good condition", "good price", "original box", "ships fast"];

/// Deterministic verdict pattern: item `i` matches filter `f` when `(i + f) % 3 != 0`
struct PatternAnalyzer;

#[async_trait]
impl Analyzer for PatternAnalyzer {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalyzeClientError> {
        Ok((0..request.items.len())
            .map(|i| {
                request
                    .filters
                    .iter()
                    .enumerate()
                    .map(|(f, name)| (name.clone(), (i + f) % 3 != 0))
                    .collect::<FilterMatches>()
            })
            .collect())
    }
}

/// Amazon analyses listing markup, so nothing is ever fetched.
struct NoFetch;

#[async_trait]
impl HtmlFetcher for NoFetch {
    async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
        anyhow::bail!("unexpected fetch of {url}")
    }
}

fn results_page() -> HtmlPage {
    let cards: String = (0..ITEMS)
        .map(|i| {
            format!(
                r#"<div data-component-type="s-search-result" data-asin="B{i:09}">
                     <div class="s-product-image-container"><img class="s-image" src="{i}.jpg"></div>
                     <h2>Item {i}</h2>
                   </div>"#
            )
        })
        .collect();
    HtmlPage::new(
        Url::parse("https://www.amazon.fr/s?k=chaise").unwrap(),
        format!(r#"<div class="s-main-slot">{cards}</div>"#),
    )
}

fn applied_engine() -> (FilterEngine, HtmlPage) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to start runtime");
    let mut engine = FilterEngine::new(
        PlatformRegistry::builtin().expect("Failed to build registry"),
        Arc::new(PatternAnalyzer),
        Arc::new(NoFetch),
    );
    let mut page = results_page();
    runtime
        .block_on(engine.apply_filters(
            &mut page,
            ApplyRequest::new(FILTERS, ITEMS, 2),
            &CancellationToken::new(),
        ))
        .expect("Failed to apply filters");
    (engine, page)
}

fn bench_update_threshold(c: &mut Criterion) {
    let (mut engine, mut page) = applied_engine();

    c.bench_function("update_threshold_200_items", |b| {
        let mut threshold = 0;
        b.iter(|| {
            threshold = (threshold + 1) % (FILTERS.len() + 1);
            let summary = engine.update_threshold(&mut page, black_box(threshold)).unwrap();
            black_box(summary)
        })
    });
}

fn bench_snapshot_summary(c: &mut Criterion) {
    let (engine, _) = applied_engine();
    let snapshot = engine.session_snapshot().expect("Session should be applied");

    c.bench_function("snapshot_summary_at", |b| {
        b.iter(|| black_box(snapshot.summary_at(black_box(3))))
    });
}

criterion_group!(benches, bench_update_threshold, bench_snapshot_summary);
criterion_main!(benches);
