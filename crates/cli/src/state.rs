//! Persisted hand-off state of the control surface.
//!
//! The last applied session of every site is stored in one JSON file,
//! keyed by host, so `status` can restore a summary without calling the API.

use anyhow::{Context, Result};
use engine::SessionSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub sites: BTreeMap<String, SessionSnapshot>,
}

impl StateFile {
    /// Read the state file; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No state file at {}", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialise state")?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;
        debug!("Saved state for {} sites to {}", self.sites.len(), path.display());
        Ok(())
    }

    pub fn get(&self, host: &str) -> Option<&SessionSnapshot> {
        self.sites.get(host)
    }

    /// Replace the stored session of `host`
    pub fn insert(&mut self, host: impl Into<String>, snapshot: SessionSnapshot) {
        self.sites.insert(host.into(), snapshot);
    }

    /// Drop the stored session of `host`, e.g. after a reset
    pub fn remove(&mut self, host: &str) -> Option<SessionSnapshot> {
        self.sites.remove(host)
    }
}
