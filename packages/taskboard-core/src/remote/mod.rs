pub mod file_handle;
pub mod gist;
pub mod manual;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::migrate::DocumentError;
use crate::sync::state::{AdapterKind, SyncSettings};
use crate::types::BoardDocument;

pub use file_handle::FileHandleAdapter;
pub use gist::GistAdapter;
pub use manual::ManualAdapter;

/// Opaque identifier of a remote document (gist id, file path, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteHandle(String);

impl RemoteHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure classes shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    CredentialInvalid,
    RemoteUnavailable,
    SchemaVersionUnsupported,
    Parse,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Credential rejected by the remote store")]
    CredentialInvalid,

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Remote operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote document not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Adapter not available: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::CredentialInvalid => ErrorClass::CredentialInvalid,
            SyncError::Document(DocumentError::UnsupportedVersion { .. }) => {
                ErrorClass::SchemaVersionUnsupported
            }
            SyncError::Document(_) => ErrorClass::Parse,
            _ => ErrorClass::RemoteUnavailable,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Unavailable(e.to_string())
    }
}

/// One external medium a board document can be pushed to and pulled from.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Whether debounced background pushes go through this adapter. Tiers that
    /// need the user in the loop only push on explicit request.
    fn supports_background_sync(&self) -> bool {
        true
    }

    /// Write the whole document. `known` is the remembered remote id, if any.
    async fn push(
        &self,
        doc: &BoardDocument,
        known: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError>;

    /// Read and decode (migrating if needed) the document behind `handle`.
    async fn pull(&self, handle: &RemoteHandle) -> Result<BoardDocument, SyncError>;

    /// Look for a pre-existing remote document.
    async fn discover(&self) -> Result<Option<RemoteHandle>, SyncError>;
}

/// Runtime capabilities that gate adapter tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Direct access to user-chosen files outside the app's own storage.
    pub file_handles: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        Self {
            file_handles: cfg!(not(target_family = "wasm")),
        }
    }
}

const TIER_ORDER: [AdapterKind; 3] = [
    AdapterKind::Filesystem,
    AdapterKind::Gist,
    AdapterKind::Manual,
];

/// Resolve the preferred tier against what this runtime and the settings can
/// serve, skipping down the fixed order filesystem > gist > manual.
pub fn select_tier(settings: &SyncSettings, caps: Capabilities) -> AdapterKind {
    let Some(start) = TIER_ORDER.iter().position(|k| *k == settings.preferred) else {
        return AdapterKind::None;
    };

    for kind in &TIER_ORDER[start..] {
        let usable = match kind {
            AdapterKind::Filesystem => caps.file_handles && settings.file_path.is_some(),
            AdapterKind::Gist => settings.credential.as_ref().is_some_and(|c| !c.is_empty()),
            AdapterKind::Manual => true,
            AdapterKind::None => false,
        };
        if usable {
            return *kind;
        }
        log::info!(
            target: "taskboard.remote",
            "Tier {} unavailable here, trying the next one",
            kind
        );
    }
    AdapterKind::Manual
}

/// Run file IO off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Unavailable(format!("file task failed: {}", e)))?
}

/// Read a whole file off the executor. A missing file is `NotFound`.
pub(crate) async fn read_text(path: PathBuf) -> Result<String, SyncError> {
    blocking(move || match fs::read_to_string(&path) {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(SyncError::NotFound(path.to_string_lossy().to_string()))
        }
        Err(e) => Err(e.into()),
    })
    .await
}

/// Build the adapter for an already selected tier.
pub fn build_adapter(
    kind: AdapterKind,
    settings: &SyncSettings,
    config: &SyncConfig,
) -> Result<Option<Arc<dyn RemoteAdapter>>, SyncError> {
    let adapter: Arc<dyn RemoteAdapter> = match kind {
        AdapterKind::None => return Ok(None),
        AdapterKind::Filesystem => {
            let path = settings
                .file_path
                .clone()
                .ok_or_else(|| SyncError::Unsupported("no file bound".to_string()))?;
            Arc::new(FileHandleAdapter::new(path))
        }
        AdapterKind::Gist => {
            let credential = settings
                .credential
                .clone()
                .ok_or(SyncError::CredentialInvalid)?;
            Arc::new(GistAdapter::new(credential, config)?)
        }
        AdapterKind::Manual => {
            let dir = settings
                .export_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));
            Arc::new(ManualAdapter::new(dir))
        }
    };
    Ok(Some(adapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::state::Credential;

    const ALL_CAPS: Capabilities = Capabilities { file_handles: true };
    const NO_FILES: Capabilities = Capabilities { file_handles: false };

    #[test]
    fn test_select_preferred_when_available() {
        let settings = SyncSettings {
            preferred: AdapterKind::Filesystem,
            file_path: Some(PathBuf::from("/tmp/kanban.json")),
            ..Default::default()
        };
        assert_eq!(select_tier(&settings, ALL_CAPS), AdapterKind::Filesystem);
    }

    #[test]
    fn test_missing_file_capability_skips_to_gist() {
        let settings = SyncSettings {
            preferred: AdapterKind::Filesystem,
            file_path: Some(PathBuf::from("/tmp/kanban.json")),
            credential: Some(Credential::new("tok")),
            ..Default::default()
        };
        assert_eq!(select_tier(&settings, NO_FILES), AdapterKind::Gist);
    }

    #[test]
    fn test_skips_to_manual_without_credential() {
        let settings = SyncSettings {
            preferred: AdapterKind::Gist,
            ..Default::default()
        };
        assert_eq!(select_tier(&settings, ALL_CAPS), AdapterKind::Manual);
    }

    #[test]
    fn test_never_climbs_above_preference() {
        let settings = SyncSettings {
            preferred: AdapterKind::Manual,
            file_path: Some(PathBuf::from("/tmp/kanban.json")),
            credential: Some(Credential::new("tok")),
            ..Default::default()
        };
        assert_eq!(select_tier(&settings, ALL_CAPS), AdapterKind::Manual);
    }

    #[test]
    fn test_none_stays_none() {
        assert_eq!(select_tier(&SyncSettings::default(), ALL_CAPS), AdapterKind::None);
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(SyncError::CredentialInvalid.class(), ErrorClass::CredentialInvalid);
        assert_eq!(
            SyncError::Timeout(Duration::from_secs(30)).class(),
            ErrorClass::RemoteUnavailable
        );
        assert_eq!(
            SyncError::Document(DocumentError::UnsupportedVersion { found: 9, supported: 3 }).class(),
            ErrorClass::SchemaVersionUnsupported
        );
        assert_eq!(
            SyncError::Document(DocumentError::Invalid("x".into())).class(),
            ErrorClass::Parse
        );
    }

    #[test]
    fn test_build_adapter_kinds() {
        let config = SyncConfig::default();
        let settings = SyncSettings {
            file_path: Some(PathBuf::from("/tmp/kanban.json")),
            credential: Some(Credential::new("tok")),
            ..Default::default()
        };
        assert!(build_adapter(AdapterKind::None, &settings, &config).unwrap().is_none());
        for kind in TIER_ORDER {
            let adapter = build_adapter(kind, &settings, &config).unwrap().unwrap();
            assert_eq!(adapter.kind(), kind);
        }
        assert!(matches!(
            build_adapter(AdapterKind::Gist, &SyncSettings::default(), &config),
            Err(SyncError::CredentialInvalid)
        ));
    }
}
