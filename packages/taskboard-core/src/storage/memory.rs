/// In-memory record store with an optional byte quota, mirroring the limits of
/// origin-scoped browser storage.
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{RecordStore, StorageError};

#[derive(Default)]
pub struct MemoryRecordStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Mutex<Option<usize>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store refusing writes that would push total value bytes above `quota`.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota: Mutex::new(Some(quota)),
        }
    }

    /// Change the quota at runtime (`None` = unlimited).
    pub fn set_quota(&self, quota: Option<usize>) {
        *self.quota.lock().unwrap_or_else(|e| e.into_inner()) = quota;
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries();
        let quota = *self.quota.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(quota) = quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries().keys().cloned().collect())
    }
}
