/// Durable local persistence of the board document.
///
/// Layered over a `RecordStore` with:
/// - Versioned record keys (`kanban_v<N>`), highest key wins on load
/// - Migration of older records, re-saved under the current key
/// - Refusal of records written by a newer schema, and of any save while
///   such a record is present
/// - Backup of undecodable records before they can be overwritten
/// - Save failures recorded as a status flag instead of propagated
use std::sync::Mutex;

use crate::migrate::{self, DocumentError};
use crate::sync::state::SyncSettings;
use crate::types::{now_millis, BoardDocument, CURRENT_VERSION};

use super::{RecordStore, StorageError};

/// Key holding persisted sync settings.
pub const SETTINGS_KEY: &str = "kanban_sync";

pub struct LocalStore {
    records: Box<dyn RecordStore>,
    /// Last save failure, cleared by the next successful save.
    last_error: Mutex<Option<String>>,
    /// Schema version of a newer record found on load. Saves are refused
    /// while it is set, since that record would keep winning.
    refused: Mutex<Option<u32>>,
}

impl LocalStore {
    pub fn new(records: impl RecordStore + 'static) -> Self {
        Self {
            records: Box::new(records),
            last_error: Mutex::new(None),
            refused: Mutex::new(None),
        }
    }

    /// Persist the document. Never fails to the caller: a failure is logged and
    /// kept as `last_error`, the in-memory document is untouched.
    /// Returns whether the write became durable.
    pub fn save(&self, doc: &BoardDocument) -> bool {
        let result = self.try_save(doc);
        let mut last_error = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        match result {
            Ok(()) => {
                *last_error = None;
                true
            }
            Err(e) => {
                log::warn!(target: "taskboard.storage", "Local save failed: {}", e);
                *last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Persist the document, reporting failures.
    pub fn try_save(&self, doc: &BoardDocument) -> Result<(), StorageError> {
        if let Some(found) = self.refused_version() {
            return Err(StorageError::NewerRecord { found });
        }
        if doc.version != CURRENT_VERSION {
            return Err(DocumentError::Invalid(format!(
                "refusing to save version {} document (current is {})",
                doc.version, CURRENT_VERSION
            ))
            .into());
        }
        let record = migrate::encode_record(doc)?;
        self.records
            .write(&migrate::record_key(CURRENT_VERSION), &record)
    }

    /// Load the newest stored record, migrated to the current version.
    ///
    /// `Ok(None)` on first use. A record from a newer schema yields
    /// `UnsupportedVersion` and is left untouched.
    pub fn load(&self) -> Result<Option<BoardDocument>, StorageError> {
        let newest = self
            .records
            .keys()?
            .iter()
            .filter_map(|k| migrate::key_version(k))
            .max();
        let Some(version) = newest else {
            return Ok(None);
        };

        if version > CURRENT_VERSION {
            log::error!(
                target: "taskboard.storage",
                "Stored board uses schema v{}, this build understands up to v{}",
                version,
                CURRENT_VERSION
            );
            self.refuse(version);
            return Err(DocumentError::UnsupportedVersion {
                found: version,
                supported: CURRENT_VERSION,
            }
            .into());
        }

        let key = migrate::record_key(version);
        let Some(raw) = self.records.read(&key)? else {
            return Ok(None);
        };

        let doc = match migrate::decode_record(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                match &e {
                    DocumentError::UnsupportedVersion { found, .. } => self.refuse(*found),
                    _ => self.backup_unreadable(&raw),
                }
                return Err(e.into());
            }
        };

        if version < CURRENT_VERSION {
            log::info!(
                target: "taskboard.storage",
                "Upgrading stored board from {} to {}",
                key,
                migrate::record_key(CURRENT_VERSION)
            );
            self.save(&doc);
        }
        Ok(Some(doc))
    }

    /// Last save failure message, if the most recent save failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Schema version of the newer record that made this store read-only.
    pub fn refused_version(&self) -> Option<u32> {
        *self.refused.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refuse(&self, found: u32) {
        *self.refused.lock().unwrap_or_else(|e| e.into_inner()) = Some(found);
    }

    /// Read persisted sync settings; defaults when absent or unreadable.
    pub fn load_settings(&self) -> SyncSettings {
        match self.records.read(SETTINGS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!(target: "taskboard.storage", "Ignoring unreadable sync settings: {}", e);
                SyncSettings::default()
            }),
            Ok(None) => SyncSettings::default(),
            Err(e) => {
                log::warn!(target: "taskboard.storage", "Failed to read sync settings: {}", e);
                SyncSettings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &SyncSettings) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(settings).map_err(DocumentError::from)?;
        self.records.write(SETTINGS_KEY, &raw)
    }

    fn backup_unreadable(&self, raw: &str) {
        let key = format!("kanban_unreadable_{}", now_millis().timestamp_millis());
        match self.records.write(&key, raw) {
            Ok(()) => log::warn!(
                target: "taskboard.storage",
                "Unreadable board record backed up under {}",
                key
            ),
            Err(e) => log::error!(
                target: "taskboard.storage",
                "Failed to back up unreadable board record: {}",
                e
            ),
        }
    }
}
