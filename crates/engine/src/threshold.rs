//! Per-item threshold evaluation.
//!
//! This is the only visibility rule in the engine. It is shared by
//! `apply_filters`, `update_threshold` and offline session snapshots.
//!
//! ## Algorithm
//! For an item with `k` evaluated filters of which `m` matched:
//! 1. required = `min(threshold, k)`, so a threshold above the item's own
//!    filter count means "all of its filters"
//! 2. the item is visible iff `m >= required`
//!
//! A threshold of 0 therefore shows every item that has a verdict.

use analyze_client::FilterMatches;

/// Outcome of evaluating one item against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Filters that matched (`m`)
    pub matched_filters: usize,
    /// Filters evaluated for this item (`k`)
    pub evaluated: usize,
    /// Matches needed to stay visible
    pub required: usize,
    pub visible: bool,
}

/// Matches an item needs, given its own filter count.
pub fn required_matches(threshold: usize, evaluated: usize) -> usize {
    threshold.min(evaluated)
}

pub fn evaluate(verdicts: &FilterMatches, threshold: usize) -> ItemOutcome {
    let evaluated = verdicts.len();
    let matched_filters = verdicts.values().filter(|&&matched| matched).count();
    let required = required_matches(threshold, evaluated);
    ItemOutcome {
        matched_filters,
        evaluated,
        required,
        visible: matched_filters >= required,
    }
}

/// Number of verdicts that meet `threshold`.
pub fn count_visible<'a, I>(verdicts: I, threshold: usize) -> usize
where
    I: IntoIterator<Item = &'a FilterMatches>,
{
    verdicts
        .into_iter()
        .filter(|v| evaluate(v, threshold).visible)
        .count()
}
