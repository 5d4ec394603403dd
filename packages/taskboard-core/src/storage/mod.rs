pub mod dir;
pub mod local;
pub mod memory;

use std::fs;
use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::migrate::DocumentError;

/// Key/value backing for local records.
/// Implementations: DirRecordStore (one file per key), MemoryRecordStore.
pub trait RecordStore: Send + Sync {
    /// Read the value stored under `key`, `Ok(None)` when absent.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value atomically.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("Local record uses schema v{found}; changes are not durable")]
    NewerRecord { found: u32 },
}

impl StorageError {
    /// True when the stored record was written by a newer schema.
    pub fn is_unsupported_version(&self) -> bool {
        matches!(
            self,
            StorageError::Document(DocumentError::UnsupportedVersion { .. })
        )
    }
}

/// SHA-256 of content with normalized line endings (for change detection).
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.replace("\r\n", "\n").as_bytes());
    hex::encode(hasher.finalize())
}

/// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
/// Refuses to write empty content over a non-empty file.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    if content.trim().is_empty() {
        if let Ok(existing) = fs::read_to_string(path) {
            if !existing.trim().is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Refusing to overwrite non-empty file with empty content",
                ));
            }
        }
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let tmp_path = path.with_extension("taskboard.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    if let Some(dir) = path.parent() {
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_normalizes_line_endings() {
        assert_eq!(content_hash("a\nb"), content_hash("a\r\nb"));
        assert_ne!(content_hash("a"), content_hash("b"));
        assert_eq!(content_hash("a").len(), 64);
    }

    #[test]
    fn test_atomic_write_refuses_empty_over_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        atomic_write(&path, "{\"v\":3}").unwrap();

        let err = atomic_write(&path, "  \n").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\":3}");
    }

    #[test]
    fn test_atomic_write_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("board.json");
        atomic_write(&path, "content").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
        assert!(!path.with_extension("taskboard.tmp").exists());
    }
}
