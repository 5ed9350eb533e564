//! Messaging bridge between a control surface and the engine.
//!
//! Commands and replies keep the JSON shape the control surface already
//! speaks (`{"type": "APPLY_FILTERS", "activeFilters": [...], ...}`).
//!
//! [`spawn_engine`] moves the engine and its page into a single tokio task.
//! Commands are handled one at a time in arrival order, so two operations
//! never interleave their page writes. A newer `APPLY_FILTERS` cancels the
//! one in flight: last apply wins.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dom::Page;
use platforms::PageKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{ApplyRequest, FilterEngine};
use crate::error::FilterError;
use crate::session::{FilterSummary, SessionSummary};

// =============================================================================
// Message contract
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "APPLY_FILTERS", rename_all = "camelCase")]
    ApplyFilters {
        active_filters: Vec<String>,
        min_match: usize,
        max_items: usize,
    },

    /// Re-threshold the current session. `maxItems` is accepted for
    /// compatibility and ignored.
    #[serde(rename = "UPDATE_MIN_MATCH", rename_all = "camelCase")]
    UpdateMinMatch {
        min_match: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },

    #[serde(rename = "RESET_FILTERS_ON_PAGE")]
    ResetFiltersOnPage,

    #[serde(rename = "getVendorInfo")]
    GetVendorInfo,

    #[serde(rename = "GET_SESSION_SUMMARY")]
    GetSessionSummary,
}

impl Command {
    /// Fire-and-forget commands are still processed in order, but their
    /// outcome is only logged.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Command::UpdateMinMatch { .. } | Command::ResetFiltersOnPage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorInfo {
    pub name: String,
    #[serde(rename = "pageType")]
    pub page_type: PageKind,
}

/// Reply to a command. Variants are distinguished by their fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Summary {
        success: bool,
        #[serde(rename = "isApplied")]
        is_applied: bool,
        matched: usize,
        total: usize,
    },
    Applied {
        success: bool,
        matched: usize,
        total: usize,
    },
    Vendor {
        success: bool,
        vendor: VendorInfo,
    },
    Status {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Reply {
    pub fn applied(summary: FilterSummary) -> Self {
        Reply::Applied {
            success: true,
            matched: summary.matched,
            total: summary.total,
        }
    }

    pub fn summary(summary: SessionSummary) -> Self {
        Reply::Summary {
            success: true,
            is_applied: summary.is_applied,
            matched: summary.matched,
            total: summary.total,
        }
    }

    pub fn vendor(vendor: VendorInfo) -> Self {
        Reply::Vendor {
            success: true,
            vendor,
        }
    }

    pub fn ok() -> Self {
        Reply::Status {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl fmt::Display) -> Self {
        Reply::Status {
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// `{success: false}` with no message, used when the page is not supported
    pub fn unsupported() -> Self {
        Reply::Status {
            success: false,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Reply::Summary { success, .. }
            | Reply::Applied { success, .. }
            | Reply::Vendor { success, .. }
            | Reply::Status { success, .. } => *success,
        }
    }

    /// The error message of a failed reply
    pub fn error(&self) -> Option<&str> {
        match self {
            Reply::Status { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

/// Run one command against the engine and build its reply.
pub async fn dispatch<P: Page>(
    engine: &mut FilterEngine,
    page: &mut P,
    command: Command,
    cancel: &CancellationToken,
) -> Reply {
    match command {
        Command::ApplyFilters {
            active_filters,
            min_match,
            max_items,
        } => {
            let request = ApplyRequest::new(active_filters, max_items, min_match);
            match engine.apply_filters(page, request, cancel).await {
                Ok(summary) => Reply::applied(summary),
                Err(e) => Reply::failure(e),
            }
        }
        Command::UpdateMinMatch { min_match, max_items } => {
            if max_items.is_some() {
                debug!("UPDATE_MIN_MATCH ignores maxItems");
            }
            match engine.update_threshold(page, min_match) {
                Ok(summary) => Reply::applied(summary),
                Err(e) => Reply::failure(e),
            }
        }
        Command::ResetFiltersOnPage => {
            engine.reset_filters(page);
            Reply::ok()
        }
        Command::GetVendorInfo => match engine.registry().resolve(page.url()) {
            Some(adapter) => Reply::vendor(VendorInfo {
                name: adapter.name().to_string(),
                page_type: adapter.page_kind(page.url()),
            }),
            None => Reply::unsupported(),
        },
        Command::GetSessionSummary => Reply::summary(engine.session_summary()),
    }
}

// =============================================================================
// Engine task
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("The engine task has stopped")]
    Closed,
}

struct Envelope {
    command: Command,
    cancel: CancellationToken,
    reply: Option<oneshot::Sender<Reply>>,
}

/// Sending side of the bridge. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<Envelope>,
    current_apply: Arc<Mutex<CancellationToken>>,
}

impl EngineHandle {
    /// Queue `command` and, unless it is fire-and-forget, wait for its reply.
    pub async fn send(&self, command: Command) -> Result<Option<Reply>, BridgeError> {
        let cancel = match command {
            Command::ApplyFilters { .. } => self.supersede(),
            _ => CancellationToken::new(),
        };

        if !command.expects_reply() {
            self.sender
                .send(Envelope {
                    command,
                    cancel,
                    reply: None,
                })
                .await
                .map_err(|_| BridgeError::Closed)?;
            return Ok(None);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Envelope {
                command,
                cancel,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| BridgeError::Closed)?;
        reply_rx.await.map(Some).map_err(|_| BridgeError::Closed)
    }

    /// Cancel the previous apply and hand out the token of the next one.
    fn supersede(&self) -> CancellationToken {
        let mut current = self
            .current_apply
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
        current.clone()
    }
}

/// Move `engine` and `page` into a task driven by the returned handle.
///
/// The task ends once every handle is dropped and gives the engine and the
/// page back through its `JoinHandle`.
pub fn spawn_engine<P>(mut engine: FilterEngine, mut page: P) -> (EngineHandle, JoinHandle<(FilterEngine, P)>)
where
    P: Page + 'static,
{
    let (sender, mut receiver) = mpsc::channel::<Envelope>(engine.config().bridge_capacity.max(1));

    let task = tokio::spawn(async move {
        while let Some(Envelope { command, cancel, reply }) = receiver.recv().await {
            let response = if cancel.is_cancelled() {
                debug!("Skipping superseded command");
                Reply::failure(FilterError::Cancelled)
            } else {
                dispatch(&mut engine, &mut page, command, &cancel).await
            };

            match reply {
                Some(reply) => {
                    if reply.send(response).is_err() {
                        debug!("Caller stopped waiting for its reply");
                    }
                }
                None => {
                    if let Some(error) = response.error() {
                        warn!("Command failed: {}", error);
                    }
                }
            }
        }
        debug!("Bridge closed, stopping engine task");
        (engine, page)
    });

    let handle = EngineHandle {
        sender,
        current_apply: Arc::new(Mutex::new(CancellationToken::new())),
    };
    (handle, task)
}
