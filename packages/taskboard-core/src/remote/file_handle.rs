/// Remote tier backed by a user-chosen file, typically inside a folder some
/// other tool keeps in sync across devices. The whole document is written with
/// one atomic replace.
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{blocking, read_text, RemoteAdapter, RemoteHandle, SyncError};
use crate::migrate;
use crate::storage::atomic_write;
use crate::sync::state::AdapterKind;
use crate::types::BoardDocument;

pub struct FileHandleAdapter {
    path: PathBuf,
}

impl FileHandleAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&self) -> RemoteHandle {
        RemoteHandle::new(self.path.to_string_lossy())
    }
}

#[async_trait]
impl RemoteAdapter for FileHandleAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Filesystem
    }

    async fn push(
        &self,
        doc: &BoardDocument,
        _known: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        let record = migrate::encode_record(doc)?;
        let path = self.path.clone();
        blocking(move || atomic_write(&path, &record).map_err(SyncError::from)).await?;
        log::info!(
            target: "taskboard.remote.file",
            "Wrote board ({} cards) to {:?}",
            doc.cards.len(),
            self.path
        );
        Ok(self.handle())
    }

    async fn pull(&self, handle: &RemoteHandle) -> Result<BoardDocument, SyncError> {
        let path = PathBuf::from(handle.as_str());
        let raw = read_text(path).await?;
        Ok(migrate::decode_record(&raw)?)
    }

    /// The file is chosen interactively, so there is nothing to discover.
    async fn discover(&self) -> Result<Option<RemoteHandle>, SyncError> {
        Ok(None)
    }
}
