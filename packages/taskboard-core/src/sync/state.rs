/// Process-local sync state, persisted sync settings, and the events the
/// coordinator publishes.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::ErrorClass;

/// Which remote tier is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    None,
    Filesystem,
    Gist,
    Manual,
}

impl AdapterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterKind::None => "none",
            AdapterKind::Filesystem => "filesystem",
            AdapterKind::Gist => "gist",
            AdapterKind::Manual => "manual",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(AdapterKind::None),
            "filesystem" | "file" => Ok(AdapterKind::Filesystem),
            "gist" => Ok(AdapterKind::Gist),
            "manual" => Ok(AdapterKind::Manual),
            other => Err(format!("unknown adapter kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    /// A change is waiting for the debounce timer.
    Debouncing,
    Saving,
    Synced,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Debouncing => "debouncing",
            SyncStatus::Saving => "saving",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Settings that survive restarts; SyncState is built from them at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub preferred: AdapterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_document_id: Option<String>,
    /// File bound to the filesystem tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Where manual exports are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
}

/// Last sync failure, kept for display on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub class: ErrorClass,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Live sync state. Owned by the coordinator, read by the board facade.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub adapter_kind: AdapterKind,
    pub remote_document_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub credential: Option<Credential>,
    pub last_error: Option<SyncFailure>,
    /// Set when sync must stay off for this process, e.g. the local record
    /// uses a newer schema than this build understands.
    pub blocked: Option<String>,
}

impl SyncState {
    pub fn report(&self) -> SyncReport {
        SyncReport {
            adapter_kind: self.adapter_kind,
            remote_document_id: self.remote_document_id.clone(),
            last_synced_at: self.last_synced_at,
            status: self.status,
            credential_present: self.credential.as_ref().is_some_and(|c| !c.is_empty()),
            last_error: self.last_error.clone(),
            blocked: self.blocked.clone(),
            local_error: None,
        }
    }
}

/// Credential-free view of the sync state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub adapter_kind: AdapterKind,
    pub remote_document_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub credential_present: bool,
    pub last_error: Option<SyncFailure>,
    pub blocked: Option<String>,
    /// Last local persistence failure, if the latest save did not land.
    pub local_error: Option<String>,
}

/// Events published by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    StatusChanged { status: SyncStatus },
    /// A remote document replaced the local one; views should re-read it.
    RemoteApplied { remote_document_id: String },
}
