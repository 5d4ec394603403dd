/// Sync tuning shared by every front end. Every field has a default, so a
/// partial or empty JSON object is a valid config.
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_GIST_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Quiet time after the last change before a push starts.
    pub debounce_ms: u64,
    /// Upper bound for any single remote round trip.
    pub remote_timeout_ms: u64,
    /// How long Synced / Error stay visible before the status returns to Idle.
    pub status_hold_ms: u64,
    /// Run discovery when a board opens or its adapter changes. Short-lived
    /// front ends turn this off and call `Board::discover_remote` themselves.
    pub auto_discover: bool,
    pub gist_api_url: String,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 5_000,
            remote_timeout_ms: 30_000,
            status_hold_ms: 3_000,
            auto_discover: true,
            gist_api_url: DEFAULT_GIST_API_URL.to_string(),
            user_agent: format!("taskboard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn status_hold(&self) -> Duration {
        Duration::from_millis(self.status_hold_ms)
    }
}
