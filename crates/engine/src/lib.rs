//! # Engine Crate
//!
//! The per-page filtering core.
//!
//! ## Components
//!
//! ### FilterEngine
//! State machine (`Idle → Collecting → Querying → Applied`) that collects
//! items through a platform adapter, sends one batched analysis request and
//! renders badges and visibility on the page.
//!
//! ### Threshold
//! The single visibility rule: an item with `k` verdicts of which `m` are
//! true stays visible iff `m >= min(threshold, k)`.
//!
//! ### Bridge
//! JSON command/reply contract of the control surface, and an actor task
//! that serialises commands with last-apply-wins cancellation.
//!
//! ## Example Usage
//!
//! ```ignore
//! use engine::{ApplyRequest, FilterEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut engine = FilterEngine::new(registry, analyzer, fetcher);
//! let request = ApplyRequest::new(["good condition", "good price"], 20, 1);
//! let summary = engine
//!     .apply_filters(&mut page, request, &CancellationToken::new())
//!     .await?;
//! println!("{}/{} items kept", summary.matched, summary.total);
//! ```

pub mod bridge;
pub mod engine;
pub mod error;
pub mod filter_spec;
pub mod session;
pub mod threshold;

// Re-export main types
pub use bridge::{dispatch, spawn_engine, BridgeError, Command, EngineHandle, Reply, VendorInfo};
pub use engine::{ApplyRequest, EngineConfig, EnginePhase, FilterEngine};
pub use error::FilterError;
pub use filter_spec::FilterSpec;
pub use session::{FilterSession, FilterSummary, SessionItem, SessionSnapshot, SessionSummary, SnapshotItem};
pub use threshold::{evaluate, required_matches, ItemOutcome};
