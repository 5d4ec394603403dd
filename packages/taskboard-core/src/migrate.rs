/// Record encoding and schema migration.
///
/// A record is `{ "v": <int>, "cards": [...] }` stored under key `kanban_v<int>`.
/// Decoding runs every migration step from the stored version up to
/// `CURRENT_VERSION` on the raw JSON value before the typed decode, so old
/// field shapes never have to be expressible in the current types.
///
/// History:
/// - v1: cards carry id, title, column, priority, createdAt.
/// - v2: cards gain `effort`.
/// - v3: optional document `updatedAt`; column `backlog` renamed to `later`.
use serde_json::{Map, Value};

use crate::types::{BoardDocument, Effort, CURRENT_VERSION};

const KEY_PREFIX: &str = "kanban_v";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Malformed board JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Invalid board document: {0}")]
    Invalid(String),
}

/// Storage key for a record of the given schema version.
pub fn record_key(version: u32) -> String {
    format!("{}{}", KEY_PREFIX, version)
}

/// Schema version encoded in a storage key, if it is a record key.
pub fn key_version(key: &str) -> Option<u32> {
    key.strip_prefix(KEY_PREFIX)?.parse().ok()
}

/// Serialize a document as a record (pretty JSON, trailing newline).
pub fn encode_record(doc: &BoardDocument) -> Result<String, DocumentError> {
    let mut out = serde_json::to_string_pretty(doc)?;
    out.push('\n');
    Ok(out)
}

/// Parse a record of any known version into a current-version document.
pub fn decode_record(raw: &str) -> Result<BoardDocument, DocumentError> {
    let value: Value = serde_json::from_str(raw)?;
    decode_value(value)
}

pub fn decode_value(mut value: Value) -> Result<BoardDocument, DocumentError> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| DocumentError::Invalid("record is not a JSON object".to_string()))?;

    let found = obj
        .get("v")
        .and_then(Value::as_u64)
        .ok_or_else(|| DocumentError::Invalid("missing or non-integer \"v\"".to_string()))?;
    let found = u32::try_from(found).map_err(|_| DocumentError::UnsupportedVersion {
        found: u32::MAX,
        supported: CURRENT_VERSION,
    })?;

    if found > CURRENT_VERSION {
        return Err(DocumentError::UnsupportedVersion {
            found,
            supported: CURRENT_VERSION,
        });
    }
    if found == 0 {
        return Err(DocumentError::Invalid("version 0 is not a board record".to_string()));
    }

    let mut version = found;
    while version < CURRENT_VERSION {
        migrate_step(version, obj)?;
        version += 1;
        obj.insert("v".to_string(), Value::from(version));
    }
    if found < CURRENT_VERSION {
        log::info!(
            target: "taskboard.migrate",
            "Migrated board record from v{} to v{}",
            found,
            CURRENT_VERSION
        );
    }

    let doc: BoardDocument = serde_json::from_value(value)?;
    if let Some(id) = doc.duplicate_id() {
        return Err(DocumentError::Invalid(format!("duplicate card id {}", id)));
    }
    Ok(doc)
}

/// Upgrade a record object from `from` to `from + 1` in place.
fn migrate_step(from: u32, obj: &mut Map<String, Value>) -> Result<(), DocumentError> {
    match from {
        1 => {
            for card in cards_mut(obj)? {
                card.entry("effort")
                    .or_insert_with(|| Value::from(Effort::MIGRATION_DEFAULT.as_str()));
            }
        }
        2 => {
            for card in cards_mut(obj)? {
                if card.get("column").and_then(Value::as_str) == Some("backlog") {
                    card.insert("column".to_string(), Value::from("later"));
                }
            }
        }
        other => {
            return Err(DocumentError::Invalid(format!(
                "no migration from version {}",
                other
            )))
        }
    }
    Ok(())
}

fn cards_mut(obj: &mut Map<String, Value>) -> Result<Vec<&mut Map<String, Value>>, DocumentError> {
    match obj.get_mut("cards") {
        None => Ok(Vec::new()),
        Some(Value::Array(cards)) => cards
            .iter_mut()
            .map(|c| {
                c.as_object_mut()
                    .ok_or_else(|| DocumentError::Invalid("card is not a JSON object".to_string()))
            })
            .collect(),
        Some(_) => Err(DocumentError::Invalid("\"cards\" is not an array".to_string())),
    }
}
