/// The surface a front end talks to: the in-memory board, its local store and
/// the sync coordinator behind it.
///
/// Every mutation lands in memory, then in the local store, then schedules a
/// debounced remote push. Remote trouble never reaches the caller of `mutate`.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::migrate::DocumentError;
use crate::remote::manual;
use crate::remote::{build_adapter, select_tier, Capabilities, RemoteHandle, SyncError};
use crate::storage::local::LocalStore;
use crate::storage::{RecordStore, StorageError};
use crate::sync::coordinator::lock;
use crate::sync::{
    AdapterConfig, AdapterKind, Credential, SyncCoordinator, SyncEvent, SyncFailure, SyncHandle,
    SyncReport, SyncSettings,
};
use crate::types::{BoardDocument, Card, Column, CURRENT_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Adapter(#[from] SyncError),

    #[error("Card not found: {0}")]
    UnknownCard(String),

    #[error("Duplicate card id: {0}")]
    DuplicateId(String),

    #[error("Sync failed: {}", .0.message)]
    Sync(SyncFailure),
}

pub struct Board {
    doc: Arc<Mutex<BoardDocument>>,
    store: Arc<LocalStore>,
    sync: SyncHandle,
    config: SyncConfig,
    caps: Capabilities,
}

impl Board {
    /// Open the board stored in `records`. Must be called inside a tokio
    /// runtime; the sync coordinator is spawned onto it.
    pub fn open(records: impl RecordStore + 'static, config: SyncConfig) -> Self {
        Self::open_with(records, config, Capabilities::detect())
    }

    pub fn open_with(records: impl RecordStore + 'static, config: SyncConfig, caps: Capabilities) -> Self {
        let store = Arc::new(LocalStore::new(records));

        let mut blocked = None;
        let doc = match store.load() {
            Ok(Some(doc)) => {
                log::info!(target: "taskboard.board", "Loaded board with {} cards", doc.cards.len());
                doc
            }
            Ok(None) => {
                log::info!(target: "taskboard.board", "No saved board, starting empty");
                BoardDocument::empty()
            }
            Err(e) if e.is_unsupported_version() => {
                log::error!(target: "taskboard.board", "Sync disabled: {}", e);
                blocked = Some(e.to_string());
                BoardDocument::empty()
            }
            Err(e) => {
                log::error!(target: "taskboard.board", "Failed to load board, starting empty: {}", e);
                BoardDocument::empty()
            }
        };

        let settings = store.load_settings();
        let initial = match &blocked {
            Some(_) => AdapterConfig::disabled(),
            None => match adapter_config(&settings, &config, caps) {
                Ok(mut initial) => {
                    initial.discover &= config.auto_discover;
                    initial
                }
                Err(e) => {
                    log::error!(target: "taskboard.board", "Cannot start sync: {}", e);
                    AdapterConfig::disabled()
                }
            },
        };

        let doc = Arc::new(Mutex::new(doc));
        let sync = SyncCoordinator::spawn(doc.clone(), store.clone(), config.clone(), initial);
        if let Some(reason) = blocked {
            sync.block(reason);
        }

        Self {
            doc,
            store,
            sync,
            config,
            caps,
        }
    }

    /// Snapshot of the current document.
    pub fn get_document(&self) -> BoardDocument {
        lock(&self.doc).clone()
    }

    /// Apply a change to the document, persist it and schedule a remote push.
    ///
    /// If `f` fails, or leaves the document with duplicate ids, the document is
    /// restored and nothing is saved.
    pub fn mutate<T>(
        &self,
        f: impl FnOnce(&mut BoardDocument) -> Result<T, BoardError>,
    ) -> Result<T, BoardError> {
        let out = {
            let mut doc = lock(&self.doc);
            let before = doc.clone();
            let out = match f(&mut doc) {
                Ok(out) => out,
                Err(e) => {
                    *doc = before;
                    return Err(e);
                }
            };
            if let Some(id) = doc.duplicate_id() {
                let id = id.to_string();
                *doc = before;
                return Err(BoardError::DuplicateId(id));
            }
            doc.version = CURRENT_VERSION;
            doc.touch();
            self.store.save(&doc);
            out
        };
        self.sync.notify_changed();
        Ok(out)
    }

    pub fn add_card(&self, card: Card) -> Result<String, BoardError> {
        self.mutate(|doc| {
            let id = card.id.clone();
            if doc.add_card(card) {
                Ok(id)
            } else {
                Err(BoardError::DuplicateId(id))
            }
        })
    }

    pub fn move_card(&self, id: &str, column: Column) -> Result<(), BoardError> {
        self.mutate(|doc| {
            if doc.move_card(id, column) {
                Ok(())
            } else {
                Err(BoardError::UnknownCard(id.to_string()))
            }
        })
    }

    pub fn remove_card(&self, id: &str) -> Result<Card, BoardError> {
        self.mutate(|doc| {
            doc.remove_card(id)
                .ok_or_else(|| BoardError::UnknownCard(id.to_string()))
        })
    }

    /// Sync state for display, including any local save failure.
    pub fn get_sync_status(&self) -> SyncReport {
        let mut report = self.sync.report();
        report.local_error = self.store.last_error();
        report
    }

    pub fn export_blob(&self) -> Result<String, BoardError> {
        Ok(manual::export_blob(&lock(&self.doc))?)
    }

    /// Replace the document with an exported blob. Validation and migration
    /// match a local load; on failure the current document is kept.
    pub fn import_blob(&self, blob: &str) -> Result<usize, BoardError> {
        let imported = manual::import_blob(blob)?;
        let count = imported.cards.len();
        {
            let mut doc = lock(&self.doc);
            *doc = imported;
            self.store.save(&doc);
        }
        log::info!(target: "taskboard.board", "Imported board with {} cards", count);
        self.sync.notify_changed();
        Ok(count)
    }

    /// Select the remote tier. `credential` replaces the stored one when given;
    /// an empty credential clears it. Returns the tier actually in use, which
    /// may be a lower one if the preferred tier cannot run here.
    pub async fn configure_adapter(
        &self,
        kind: AdapterKind,
        credential: Option<Credential>,
    ) -> Result<AdapterKind, BoardError> {
        let mut settings = self.store.load_settings();
        let credential = credential.map(|c| Some(c).filter(|c| !c.is_empty()));
        let credential_changed = credential.as_ref().is_some_and(|c| *c != settings.credential);
        if kind != settings.preferred || credential_changed {
            settings.remote_document_id = None;
        }
        settings.preferred = kind;
        if let Some(credential) = credential {
            settings.credential = credential;
        }

        let mut initial = adapter_config(&settings, &self.config, self.caps)?;
        initial.discover &= self.config.auto_discover;
        self.store.save_settings(&settings)?;

        let active = initial.kind;
        log::info!(
            target: "taskboard.board",
            "Sync configured: preferred {}, active {}",
            kind,
            active
        );
        if self.get_sync_status().blocked.is_none() {
            self.sync.configure(initial).await;
        }
        Ok(active)
    }

    /// Bind the file used by the filesystem tier. Takes effect on the next
    /// `configure_adapter`.
    pub fn bind_file(&self, path: impl Into<PathBuf>) -> Result<(), BoardError> {
        let path = path.into();
        self.update_settings(|s| {
            if s.file_path.as_ref() != Some(&path) && s.preferred == AdapterKind::Filesystem {
                s.remote_document_id = None;
            }
            s.file_path = Some(path);
        })
    }

    /// Directory manual exports are written to.
    pub fn set_export_dir(&self, dir: impl Into<PathBuf>) -> Result<(), BoardError> {
        let dir = dir.into();
        self.update_settings(|s| s.export_dir = Some(dir))
    }

    pub fn settings(&self) -> SyncSettings {
        self.store.load_settings()
    }

    /// Push now, skipping the debounce, and wait for the outcome.
    pub async fn sync_now(&self) -> Result<(), BoardError> {
        self.sync.sync_now().await.map_err(BoardError::Sync)
    }

    /// Look for a remote document and apply it if it wins.
    pub async fn discover_remote(&self) -> Result<Option<RemoteHandle>, BoardError> {
        self.sync.discover_remote().await.map_err(BoardError::Sync)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.subscribe()
    }

    fn update_settings(&self, f: impl FnOnce(&mut SyncSettings)) -> Result<(), BoardError> {
        let mut settings = self.store.load_settings();
        f(&mut settings);
        self.store.save_settings(&settings)?;
        Ok(())
    }
}

/// Resolve the tier to run and build its adapter from persisted settings.
fn adapter_config(
    settings: &SyncSettings,
    config: &SyncConfig,
    caps: Capabilities,
) -> Result<AdapterConfig, SyncError> {
    let kind = select_tier(settings, caps);
    let adapter = build_adapter(kind, settings, config)?;

    let remote_document_id = match kind {
        AdapterKind::Filesystem => settings
            .file_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        _ if kind == settings.preferred => settings.remote_document_id.clone(),
        _ => None,
    };

    Ok(AdapterConfig {
        kind,
        discover: adapter.is_some(),
        adapter,
        remote_document_id,
        credential: settings.credential.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::gist::{GIST_DESCRIPTION, GIST_FILENAME};
    use crate::remote::ErrorClass;
    use crate::storage::dir::DirRecordStore;
    use crate::storage::memory::MemoryRecordStore;
    use crate::sync::SyncStatus;
    use crate::types::{Effort, Priority};
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ALL_CAPS: Capabilities = Capabilities { file_handles: true };

    fn fast_config() -> SyncConfig {
        SyncConfig {
            debounce_ms: 50,
            remote_timeout_ms: 5_000,
            status_hold_ms: 60_000,
            ..Default::default()
        }
    }

    fn card(title: &str) -> Card {
        Card::new(title, Column::Inbox, Priority::Medium, Effort::Hour1)
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<SyncEvent>,
        wanted: impl Fn(&SyncEvent) -> bool,
    ) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(event) if wanted(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for sync event")
    }

    #[tokio::test]
    async fn test_mutate_persists_and_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let board = Board::open(DirRecordStore::new(dir.path()), fast_config());

        let id = board.add_card(card("Call the bank")).unwrap();
        board.move_card(&id, Column::Now).unwrap();
        let doc = board.get_document();
        assert!(doc.updated_at.is_some());
        assert_eq!(doc.card(&id).unwrap().column, Column::Now);

        let reopened = Board::open(DirRecordStore::new(dir.path()), fast_config());
        assert_eq!(reopened.get_document(), doc);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_document_untouched() {
        let board = Board::open(MemoryRecordStore::new(), fast_config());
        let id = board.add_card(card("only")).unwrap();
        let before = board.get_document();

        let err = board
            .mutate(|doc| {
                doc.cards[0].title = "changed".into();
                doc.add_card(Card { id: "x".into(), ..card("a") });
                doc.cards.push(Card { id: id.clone(), ..card("clone") });
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, BoardError::DuplicateId(_)));
        assert_eq!(board.get_document(), before);

        assert!(matches!(
            board.remove_card("missing"),
            Err(BoardError::UnknownCard(_))
        ));
        assert_eq!(board.get_document(), before);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = Board::open(MemoryRecordStore::new(), fast_config());
        source.add_card(card("one")).unwrap();
        source.add_card(Card::new("two", Column::Done, Priority::Critical, Effort::Days3)).unwrap();
        let blob = source.export_blob().unwrap();

        let target = Board::open(MemoryRecordStore::new(), fast_config());
        assert_eq!(target.import_blob(&blob).unwrap(), 2);
        assert_eq!(target.get_document(), source.get_document());
    }

    #[tokio::test]
    async fn test_bad_import_keeps_prior_state() {
        let board = Board::open(MemoryRecordStore::new(), fast_config());
        board.add_card(card("keep me")).unwrap();
        let before = board.get_document();

        assert!(matches!(
            board.import_blob("{ not json"),
            Err(BoardError::Document(DocumentError::Json(_)))
        ));
        assert!(matches!(
            board.import_blob(r#"{"v":42,"cards":[]}"#),
            Err(BoardError::Document(DocumentError::UnsupportedVersion { found: 42, .. }))
        ));
        assert_eq!(board.get_document(), before);
    }

    #[tokio::test]
    async fn test_old_record_is_migrated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("kanban_v1.json"),
            r#"{"v":1,"cards":[{"id":"c1","title":"Legacy","column":"backlog","priority":"high","createdAt":1700000000000}]}"#,
        )
        .unwrap();

        let board = Board::open(DirRecordStore::new(dir.path()), fast_config());
        let doc = board.get_document();
        assert_eq!(doc.version, CURRENT_VERSION);
        let card = doc.card("c1").unwrap();
        assert_eq!(card.title, "Legacy");
        assert_eq!(card.priority, Priority::High);
        assert_eq!(card.column, Column::Later);
        assert_eq!(card.effort, Effort::Hour1);
        assert_eq!(card.created_at.timestamp_millis(), 1_700_000_000_000);
        assert!(dir.path().join("kanban_v3.json").exists());
    }

    #[tokio::test]
    async fn test_newer_local_record_blocks_sync() {
        let dir = tempfile::tempdir().unwrap();
        let future = r#"{"v":9,"cards":[],"shiny":true}"#;
        fs::write(dir.path().join("kanban_v9.json"), future).unwrap();

        let board = Board::open(DirRecordStore::new(dir.path()), fast_config());
        assert!(board.get_document().cards.is_empty());

        let err = board.sync_now().await.unwrap_err();
        assert!(matches!(
            err,
            BoardError::Sync(SyncFailure { class: ErrorClass::SchemaVersionUnsupported, .. })
        ));
        assert!(board.get_sync_status().blocked.is_some());
        assert_eq!(fs::read_to_string(dir.path().join("kanban_v9.json")).unwrap(), future);
    }

    #[tokio::test]
    async fn test_edits_under_newer_record_are_flagged_not_durable() {
        let dir = tempfile::tempdir().unwrap();
        let future = r#"{"v":9,"cards":[],"shiny":true}"#;
        fs::write(dir.path().join("kanban_v9.json"), future).unwrap();

        {
            let board = Board::open(DirRecordStore::new(dir.path()), fast_config());
            board.add_card(card("made while blocked")).unwrap();
            assert_eq!(board.get_document().cards.len(), 1);

            let status = board.get_sync_status();
            let local_error = status.local_error.expect("save should be refused");
            assert!(local_error.contains("schema v9"));
            assert!(status.blocked.is_some());
        }

        assert!(!dir.path().join("kanban_v3.json").exists());
        assert_eq!(fs::read_to_string(dir.path().join("kanban_v9.json")).unwrap(), future);

        let reopened = Board::open(DirRecordStore::new(dir.path()), fast_config());
        assert!(reopened.get_document().cards.is_empty());
        assert!(reopened.get_sync_status().blocked.is_some());
    }

    #[tokio::test]
    async fn test_quota_failure_surfaces_as_flag() {
        let board = Board::open(MemoryRecordStore::with_quota(400), fast_config());
        for i in 0..10 {
            board.add_card(card(&format!("card number {}", i))).unwrap();
        }
        assert_eq!(board.get_document().cards.len(), 10);
        let status = board.get_sync_status();
        assert!(status.local_error.unwrap().contains("quota"));
    }

    #[tokio::test]
    async fn test_gist_first_push_creates_one_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octo"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gists"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "fresh-gist",
                "description": GIST_DESCRIPTION,
                "files": { GIST_FILENAME: {} }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/gists/fresh-gist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "fresh-gist"})))
            .mount(&server)
            .await;

        let config = SyncConfig {
            gist_api_url: server.uri(),
            ..fast_config()
        };
        let board = Board::open_with(MemoryRecordStore::new(), config, ALL_CAPS);
        let active = board
            .configure_adapter(AdapterKind::Gist, Some(Credential::new("tok")))
            .await
            .unwrap();
        assert_eq!(active, AdapterKind::Gist);

        board.add_card(card("first")).unwrap();
        board.sync_now().await.unwrap();
        board.add_card(card("second")).unwrap();
        board.sync_now().await.unwrap();

        let status = board.get_sync_status();
        assert_eq!(status.remote_document_id.as_deref(), Some("fresh-gist"));
        assert_eq!(status.status, SyncStatus::Synced);
        assert!(status.credential_present);
        assert_eq!(board.settings().remote_document_id.as_deref(), Some("fresh-gist"));
    }

    #[tokio::test]
    async fn test_tier_switch_discards_running_discovery() {
        let mut newer = BoardDocument::empty();
        newer.add_card(card("from the gist"));
        newer.updated_at = Some(chrono::Utc::now() + chrono::Duration::days(1));
        let record = crate::migrate::encode_record(&newer).unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octo"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gists"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!([{
                        "id": "remote-board",
                        "description": GIST_DESCRIPTION,
                        "files": { GIST_FILENAME: {} }
                    }])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gists/remote-board"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "remote-board",
                "description": GIST_DESCRIPTION,
                "files": { GIST_FILENAME: { "content": record } }
            })))
            .mount(&server)
            .await;

        let exports = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            gist_api_url: server.uri(),
            ..fast_config()
        };
        let board = Board::open_with(MemoryRecordStore::new(), config, ALL_CAPS);
        board.add_card(card("mine")).unwrap();
        board.set_export_dir(exports.path()).unwrap();
        let before = board.get_document();
        let mut events = board.subscribe();

        // Configuring the gist tier starts discovery; switch away while it runs.
        board
            .configure_adapter(AdapterKind::Gist, Some(Credential::new("tok")))
            .await
            .unwrap();
        let active = board.configure_adapter(AdapterKind::Manual, None).await.unwrap();
        assert_eq!(active, AdapterKind::Manual);

        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(board.get_document(), before);
        let status = board.get_sync_status();
        assert_eq!(status.adapter_kind, AdapterKind::Manual);
        assert_ne!(status.remote_document_id.as_deref(), Some("remote-board"));
        assert_eq!(board.settings().remote_document_id, None);
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SyncEvent::RemoteApplied { .. }),
                "stale discovery was applied: {:?}",
                event
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_credential_does_not_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = SyncConfig {
            gist_api_url: server.uri(),
            ..fast_config()
        };
        let board = Board::open_with(MemoryRecordStore::new(), config, ALL_CAPS);
        board
            .configure_adapter(AdapterKind::Gist, Some(Credential::new("revoked")))
            .await
            .unwrap();

        let err = board.discover_remote().await.unwrap_err();
        assert!(matches!(
            err,
            BoardError::Sync(SyncFailure { class: ErrorClass::CredentialInvalid, .. })
        ));
        let status = board.get_sync_status();
        assert_eq!(status.adapter_kind, AdapterKind::Gist);
        assert_eq!(status.last_error.unwrap().class, ErrorClass::CredentialInvalid);
    }

    #[tokio::test]
    async fn test_second_device_adopts_unstamped_remote_then_overwrites_it() {
        let shared = tempfile::tempdir().unwrap();
        let remote_path = shared.path().join("kanban.json");
        // Written by a device that never stamps its documents.
        fs::write(
            &remote_path,
            r#"{"v":3,"cards":[{"id":"from-a","title":"Device A card","column":"now","priority":"high","effort":"1h","createdAt":1}]}"#,
        )
        .unwrap();

        let local = tempfile::tempdir().unwrap();
        {
            let seed = LocalStore::new(DirRecordStore::new(local.path()));
            let mut doc = BoardDocument::empty();
            doc.add_card(card("Device B card"));
            doc.touch();
            seed.save(&doc);
            seed.save_settings(&SyncSettings {
                preferred: AdapterKind::Filesystem,
                file_path: Some(remote_path.clone()),
                ..Default::default()
            })
            .unwrap();
        }

        let board = Board::open_with(DirRecordStore::new(local.path()), fast_config(), ALL_CAPS);
        let mut events = board.subscribe();
        wait_for(&mut events, |e| matches!(e, SyncEvent::RemoteApplied { .. })).await;

        let adopted = board.get_document();
        assert_eq!(adopted.cards.len(), 1);
        assert_eq!(adopted.cards[0].id, "from-a");

        board.add_card(card("B edits after adopting")).unwrap();
        wait_for(&mut events, |e| {
            *e == SyncEvent::StatusChanged {
                status: SyncStatus::Synced,
            }
        })
        .await;

        let remote = crate::migrate::decode_record(&fs::read_to_string(&remote_path).unwrap()).unwrap();
        assert_eq!(remote, board.get_document());
        assert_eq!(remote.cards.len(), 2);
        assert!(remote.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_manual_tier_exports_on_request_only() {
        let exports = tempfile::tempdir().unwrap();
        let board = Board::open_with(MemoryRecordStore::new(), fast_config(), ALL_CAPS);
        board.set_export_dir(exports.path()).unwrap();
        let active = board.configure_adapter(AdapterKind::Manual, None).await.unwrap();
        assert_eq!(active, AdapterKind::Manual);

        board.add_card(card("carry")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fs::read_dir(exports.path()).unwrap().count(), 0);

        board.sync_now().await.unwrap();
        let files: Vec<_> = fs::read_dir(exports.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_preferred_filesystem_without_file_falls_back_to_manual() {
        let board = Board::open_with(MemoryRecordStore::new(), fast_config(), ALL_CAPS);
        let active = board
            .configure_adapter(AdapterKind::Filesystem, None)
            .await
            .unwrap();
        assert_eq!(active, AdapterKind::Manual);
        assert_eq!(board.settings().preferred, AdapterKind::Filesystem);
    }
}
