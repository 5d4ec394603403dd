/// Terminal fallback tier: plain JSON files the user carries between devices.
///
/// A push writes a fresh export file (never overwriting an earlier one); a pull
/// reads whatever file the user hands back. No network, no discovery.
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{blocking, read_text, RemoteAdapter, RemoteHandle, SyncError};
use crate::migrate::{self, DocumentError};
use crate::storage::atomic_write;
use crate::sync::state::AdapterKind;
use crate::types::{now_millis, BoardDocument};

/// Serialize a document as an exportable blob (same shape as the local record).
pub fn export_blob(doc: &BoardDocument) -> Result<String, DocumentError> {
    migrate::encode_record(doc)
}

/// Parse a user-supplied blob, validating and migrating exactly like a local load.
pub fn import_blob(blob: &str) -> Result<BoardDocument, DocumentError> {
    migrate::decode_record(blob)
}

pub struct ManualAdapter {
    export_dir: PathBuf,
}

impl ManualAdapter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

}

fn next_export_path(dir: &Path) -> PathBuf {
    let stamp = now_millis().format("%Y%m%d-%H%M%S%3f");
    let mut path = dir.join(format!("kanban-{}.json", stamp));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("kanban-{}-{}.json", stamp, n));
        n += 1;
    }
    path
}

#[async_trait]
impl RemoteAdapter for ManualAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Manual
    }

    fn supports_background_sync(&self) -> bool {
        false
    }

    async fn push(
        &self,
        doc: &BoardDocument,
        _known: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        let blob = export_blob(doc)?;
        let dir = self.export_dir.clone();
        let path = blocking(move || {
            let path = next_export_path(&dir);
            atomic_write(&path, &blob)?;
            Ok(path)
        })
        .await?;
        log::info!(target: "taskboard.remote.manual", "Exported board to {:?}", path);
        Ok(RemoteHandle::new(path.to_string_lossy()))
    }

    async fn pull(&self, handle: &RemoteHandle) -> Result<BoardDocument, SyncError> {
        let blob = read_text(PathBuf::from(handle.as_str())).await?;
        Ok(import_blob(&blob)?)
    }

    async fn discover(&self) -> Result<Option<RemoteHandle>, SyncError> {
        Ok(None)
    }
}
