/// Sync coordinator: one actor task per board.
///
/// Cycle: Idle -> Debouncing -> Saving -> Synced | Error -> Idle.
///
/// - Every local change restarts the debounce timer.
/// - At most one remote operation (push or discovery) runs at a time. Work
///   requested meanwhile is queued and started when it resolves.
/// - A push serializes its snapshot when it starts; changes made during the
///   push start a new cycle afterwards, so the last state always ends up remote.
/// - Each operation carries the configuration generation it was started
///   under. Reconfiguring bumps the generation; stale results are dropped.
/// - Remote failures only ever touch SyncState. The local document is never
///   rolled back.
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, timeout, Instant};

use super::state::{AdapterKind, Credential, SyncEvent, SyncFailure, SyncReport, SyncState, SyncStatus};
use crate::config::SyncConfig;
use crate::migrate;
use crate::remote::{ErrorClass, RemoteAdapter, RemoteHandle, SyncError};
use crate::storage::content_hash;
use crate::storage::local::LocalStore;
use crate::types::{now_millis, BoardDocument};

const EVENT_CAPACITY: usize = 64;

type FlushReply = oneshot::Sender<Result<(), SyncFailure>>;
type DiscoverReply = oneshot::Sender<Result<Option<RemoteHandle>, SyncFailure>>;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn failure(class: ErrorClass, message: impl Into<String>) -> SyncFailure {
    SyncFailure {
        class,
        message: message.into(),
        at: now_millis(),
    }
}

fn stopped() -> SyncFailure {
    failure(ErrorClass::RemoteUnavailable, "sync coordinator stopped")
}

fn superseded() -> SyncFailure {
    failure(
        ErrorClass::RemoteUnavailable,
        "sync configuration changed before the operation finished",
    )
}

/// Adapter selection handed to the coordinator.
pub struct AdapterConfig {
    pub kind: AdapterKind,
    pub adapter: Option<Arc<dyn RemoteAdapter>>,
    pub remote_document_id: Option<String>,
    pub credential: Option<Credential>,
    /// Look for an existing remote document once installed.
    pub discover: bool,
}

impl AdapterConfig {
    pub fn disabled() -> Self {
        Self {
            kind: AdapterKind::None,
            adapter: None,
            remote_document_id: None,
            credential: None,
            discover: false,
        }
    }
}

enum Command {
    Changed,
    SyncNow(FlushReply),
    Discover(DiscoverReply),
    Configure(AdapterConfig, oneshot::Sender<()>),
    Block(String),
}

struct Completion {
    generation: u64,
    outcome: Outcome,
}

enum Outcome {
    Pushed {
        result: Result<RemoteHandle, SyncError>,
        fingerprint: String,
    },
    Discovered {
        result: Result<Discovery, SyncError>,
        /// Local recency stamp when discovery started.
        local_stamp: Option<DateTime<Utc>>,
    },
}

struct Discovery {
    handle: Option<RemoteHandle>,
    remote: Option<BoardDocument>,
}

/// Cheap handle to a running coordinator.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: Arc<Mutex<SyncState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncHandle {
    /// A local change happened; (re)start the debounce timer.
    pub fn notify_changed(&self) {
        let _ = self.tx.send(Command::Changed);
    }

    /// Push the current document now, skipping the debounce, and wait for the
    /// outcome.
    pub async fn sync_now(&self) -> Result<(), SyncFailure> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::SyncNow(tx)).is_err() {
            return Err(stopped());
        }
        rx.await.unwrap_or_else(|_| Err(stopped()))
    }

    /// Look for a remote document, apply it under last-write-wins, and report
    /// the remote id found.
    pub async fn discover_remote(&self) -> Result<Option<RemoteHandle>, SyncFailure> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Discover(tx)).is_err() {
            return Err(stopped());
        }
        rx.await.unwrap_or_else(|_| Err(stopped()))
    }

    /// Swap the active adapter. Any in-flight operation finishes but its
    /// result is discarded.
    pub async fn configure(&self, config: AdapterConfig) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Configure(config, tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Turn sync off for the rest of the process.
    pub fn block(&self, reason: impl Into<String>) {
        let reason = reason.into();
        lock(&self.state).blocked = Some(reason.clone());
        let _ = self.tx.send(Command::Block(reason));
    }

    pub fn report(&self) -> SyncReport {
        lock(&self.state).report()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }
}

pub struct SyncCoordinator {
    doc: Arc<Mutex<BoardDocument>>,
    store: Arc<LocalStore>,
    config: SyncConfig,
    state: Arc<Mutex<SyncState>>,
    events: broadcast::Sender<SyncEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,

    adapter: Option<Arc<dyn RemoteAdapter>>,
    generation: u64,
    debounce_at: Option<Instant>,
    idle_at: Option<Instant>,
    in_flight: bool,
    changed_during_flight: bool,
    push_requested: bool,
    discover_requested: bool,
    /// Fingerprint of the last record the remote is known to hold.
    last_fingerprint: Option<String>,
    /// A discovery already completed under the current generation.
    discovered: bool,
    flush_waiters: Vec<FlushReply>,
    current_flush: Vec<FlushReply>,
    discover_waiters: Vec<DiscoverReply>,
    current_discover: Vec<DiscoverReply>,
}

impl SyncCoordinator {
    /// Spawn the coordinator on the current tokio runtime.
    pub fn spawn(
        doc: Arc<Mutex<BoardDocument>>,
        store: Arc<LocalStore>,
        config: SyncConfig,
        initial: AdapterConfig,
    ) -> SyncHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = Arc::new(Mutex::new(SyncState::default()));

        let mut coordinator = SyncCoordinator {
            doc,
            store,
            config,
            state: state.clone(),
            events: events.clone(),
            done_tx,
            adapter: None,
            generation: 0,
            debounce_at: None,
            idle_at: None,
            in_flight: false,
            changed_during_flight: false,
            push_requested: false,
            discover_requested: false,
            last_fingerprint: None,
            discovered: false,
            flush_waiters: Vec::new(),
            current_flush: Vec::new(),
            discover_waiters: Vec::new(),
            current_discover: Vec::new(),
        };
        coordinator.configure(initial);
        tokio::spawn(coordinator.run(rx, done_rx));

        SyncHandle { tx, state, events }
    }

    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Command>,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            let debounce_at = if self.in_flight { None } else { self.debounce_at };
            let idle_at = self.idle_at;

            tokio::select! {
                biased;
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                Some(done) = done_rx.recv() => self.complete(done),
                _ = sleep_until(debounce_at.unwrap_or_else(Instant::now)), if debounce_at.is_some() => {
                    self.debounce_at = None;
                    self.start_push();
                }
                _ = sleep_until(idle_at.unwrap_or_else(Instant::now)), if idle_at.is_some() => {
                    self.idle_at = None;
                    if matches!(self.status(), SyncStatus::Synced | SyncStatus::Error) {
                        self.set_status(SyncStatus::Idle);
                    }
                }
            }
        }
        log::debug!(target: "taskboard.sync", "Coordinator stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Changed => self.on_changed(),
            Command::SyncNow(reply) => {
                if let Some(reason) = self.blocked() {
                    let _ = reply.send(Err(failure(ErrorClass::SchemaVersionUnsupported, reason)));
                    return;
                }
                if self.adapter.is_none() {
                    let _ = reply.send(Err(failure(
                        ErrorClass::RemoteUnavailable,
                        "no sync adapter configured",
                    )));
                    return;
                }
                self.flush_waiters.push(reply);
                self.debounce_at = None;
                if self.in_flight {
                    self.push_requested = true;
                } else {
                    self.start_push();
                }
            }
            Command::Discover(reply) => {
                if let Some(reason) = self.blocked() {
                    let _ = reply.send(Err(failure(ErrorClass::SchemaVersionUnsupported, reason)));
                    return;
                }
                if self.adapter.is_none() {
                    let _ = reply.send(Ok(None));
                    return;
                }
                self.discover_waiters.push(reply);
                if self.in_flight {
                    self.discover_requested = true;
                } else {
                    self.start_discovery();
                }
            }
            Command::Configure(config, ack) => {
                self.configure(config);
                let _ = ack.send(());
            }
            Command::Block(reason) => {
                log::warn!(target: "taskboard.sync", "Sync disabled: {}", reason);
                lock(&self.state).blocked = Some(reason);
                self.debounce_at = None;
                self.changed_during_flight = false;
                self.set_status(SyncStatus::Idle);
            }
        }
    }

    fn configure(&mut self, config: AdapterConfig) {
        self.generation += 1;
        self.last_fingerprint = None;
        self.discovered = false;
        self.push_requested = false;
        self.idle_at = None;
        for reply in self.flush_waiters.drain(..) {
            let _ = reply.send(Err(superseded()));
        }

        let background = config
            .adapter
            .as_ref()
            .is_some_and(|a| a.supports_background_sync());
        if !background {
            self.debounce_at = None;
            self.changed_during_flight = false;
        }

        {
            let mut state = lock(&self.state);
            state.adapter_kind = config.kind;
            state.remote_document_id = config.remote_document_id;
            state.credential = config.credential;
            state.last_error = None;
        }
        self.adapter = config.adapter;
        log::info!(
            target: "taskboard.sync",
            "Sync tier set to {} (generation {})",
            config.kind,
            self.generation
        );

        if self.debounce_at.is_some() {
            self.set_status(SyncStatus::Debouncing);
        } else {
            self.set_status(SyncStatus::Idle);
        }

        if config.discover && self.adapter.is_some() && self.blocked().is_none() {
            if self.in_flight {
                self.discover_requested = true;
            } else {
                self.start_discovery();
            }
        }
    }

    fn on_changed(&mut self) {
        if self.blocked().is_some() {
            return;
        }
        let Some(adapter) = &self.adapter else {
            return;
        };
        if !adapter.supports_background_sync() {
            return;
        }

        self.idle_at = None;
        if self.in_flight {
            self.changed_during_flight = true;
            if self.status() != SyncStatus::Saving {
                self.set_status(SyncStatus::Debouncing);
            }
            return;
        }
        self.debounce_at = Some(Instant::now() + self.config.debounce());
        self.set_status(SyncStatus::Debouncing);
    }

    fn start_push(&mut self) {
        let Some(adapter) = self.adapter.clone() else {
            return;
        };
        self.current_flush.append(&mut self.flush_waiters);
        self.push_requested = false;
        self.changed_during_flight = false;

        let snapshot = lock(&self.doc).clone();
        let record = match migrate::encode_record(&snapshot) {
            Ok(record) => record,
            Err(e) => {
                let f = self.record_failure(&SyncError::from(e));
                self.resolve_flush(Err(f));
                return;
            }
        };
        let fingerprint = content_hash(&record);

        if adapter.supports_background_sync()
            && self.last_fingerprint.as_deref() == Some(fingerprint.as_str())
        {
            log::debug!(target: "taskboard.sync", "Board unchanged since last push, skipping");
            self.mark_synced();
            self.resolve_flush(Ok(()));
            return;
        }

        let known = lock(&self.state)
            .remote_document_id
            .clone()
            .map(RemoteHandle::new);
        self.in_flight = true;
        self.set_status(SyncStatus::Saving);
        log::info!(
            target: "taskboard.sync",
            "Pushing board ({} cards) via {}",
            snapshot.cards.len(),
            adapter.kind()
        );

        let generation = self.generation;
        let done = self.done_tx.clone();
        let limit = self.config.remote_timeout();
        tokio::spawn(async move {
            let result = bounded(limit, adapter.push(&snapshot, known.as_ref())).await;
            let _ = done.send(Completion {
                generation,
                outcome: Outcome::Pushed { result, fingerprint },
            });
        });
    }

    fn start_discovery(&mut self) {
        let Some(adapter) = self.adapter.clone() else {
            return;
        };
        self.current_discover.append(&mut self.discover_waiters);
        self.discover_requested = false;

        let known = lock(&self.state)
            .remote_document_id
            .clone()
            .map(RemoteHandle::new);
        let local_stamp = lock(&self.doc).updated_at;
        self.in_flight = true;
        log::info!(target: "taskboard.sync", "Looking for a remote board via {}", adapter.kind());

        let generation = self.generation;
        let done = self.done_tx.clone();
        let limit = self.config.remote_timeout();
        tokio::spawn(async move {
            let result = discover_and_pull(adapter, known, limit).await;
            let _ = done.send(Completion {
                generation,
                outcome: Outcome::Discovered { result, local_stamp },
            });
        });
    }

    fn complete(&mut self, done: Completion) {
        self.in_flight = false;

        if done.generation != self.generation {
            log::info!(
                target: "taskboard.sync",
                "Discarding result from superseded sync configuration (generation {})",
                done.generation
            );
            self.resolve_flush(Err(superseded()));
            self.resolve_discover(Err(superseded()));
        } else {
            match done.outcome {
                Outcome::Pushed { result, fingerprint } => self.finish_push(result, fingerprint),
                Outcome::Discovered { result, local_stamp } => {
                    self.finish_discovery(result, local_stamp)
                }
            }
        }

        self.resume();
    }

    /// Start whatever was queued while an operation was in flight.
    fn resume(&mut self) {
        if self.in_flight {
            return;
        }
        if self.discover_requested {
            self.start_discovery();
        } else if self.push_requested {
            self.start_push();
        } else if self.changed_during_flight {
            self.changed_during_flight = false;
            self.idle_at = None;
            self.debounce_at = Some(Instant::now() + self.config.debounce());
            self.set_status(SyncStatus::Debouncing);
        }
    }

    fn finish_push(&mut self, result: Result<RemoteHandle, SyncError>, fingerprint: String) {
        match result {
            Ok(handle) => {
                log::info!(target: "taskboard.sync", "Board synced to {}", handle);
                self.last_fingerprint = Some(fingerprint);
                self.remember_handle(&handle);
                self.mark_synced();
                self.resolve_flush(Ok(()));
            }
            Err(e) => {
                let f = self.record_failure(&e);
                self.resolve_flush(Err(f));
            }
        }
    }

    fn finish_discovery(&mut self, result: Result<Discovery, SyncError>, local_stamp: Option<DateTime<Utc>>) {
        match result {
            Err(e) => {
                let f = self.record_failure(&e);
                self.resolve_discover(Err(f));
            }
            Ok(Discovery { handle, remote }) => {
                if let Some(handle) = &handle {
                    self.remember_handle(handle);
                    if let Some(remote) = remote {
                        self.apply_remote(handle, remote, local_stamp);
                    }
                }
                self.discovered = true;
                self.resolve_discover(Ok(handle));
            }
        }
    }

    /// Last-write-wins at whole-document granularity, evaluated once at
    /// discovery time.
    fn apply_remote(
        &mut self,
        handle: &RemoteHandle,
        remote: BoardDocument,
        local_stamp: Option<DateTime<Utc>>,
    ) {
        let remote_fingerprint = migrate::encode_record(&remote).ok().map(|r| content_hash(&r));

        let applied = {
            let mut doc = lock(&self.doc);
            if doc.updated_at != local_stamp {
                log::info!(
                    target: "taskboard.sync",
                    "Local board changed during discovery, keeping local state"
                );
                return;
            }
            if *doc == remote {
                None
            } else if remote_wins(&doc, &remote, !self.discovered) {
                *doc = remote;
                self.store.save(&doc);
                Some(true)
            } else {
                Some(false)
            }
        };

        match applied {
            None => {
                self.last_fingerprint = remote_fingerprint;
                self.mark_synced();
            }
            Some(true) => {
                log::info!(target: "taskboard.sync", "Replaced local board with remote {}", handle);
                self.last_fingerprint = remote_fingerprint;
                self.mark_synced();
                let _ = self.events.send(SyncEvent::RemoteApplied {
                    remote_document_id: handle.to_string(),
                });
            }
            Some(false) => log::info!(
                target: "taskboard.sync",
                "Remote board {} is older than local, next change will overwrite it",
                handle
            ),
        }
    }

    fn remember_handle(&mut self, handle: &RemoteHandle) {
        let active = {
            let mut state = lock(&self.state);
            if state.remote_document_id.as_deref() == Some(handle.as_str()) {
                return;
            }
            state.remote_document_id = Some(handle.to_string());
            state.adapter_kind
        };
        let mut settings = self.store.load_settings();
        // Ids from a fallback tier mean nothing to the preferred one.
        if settings.preferred == active {
            settings.remote_document_id = Some(handle.to_string());
            if let Err(e) = self.store.save_settings(&settings) {
                log::warn!(target: "taskboard.sync", "Failed to remember remote id: {}", e);
            }
        }
    }

    fn mark_synced(&mut self) {
        {
            let mut state = lock(&self.state);
            state.last_synced_at = Some(now_millis());
            state.last_error = None;
        }
        self.set_status(SyncStatus::Synced);
        self.idle_at = Some(Instant::now() + self.config.status_hold());
    }

    fn record_failure(&mut self, e: &SyncError) -> SyncFailure {
        let f = failure(e.class(), e.to_string());
        log::warn!(target: "taskboard.sync", "Sync failed ({:?}): {}", f.class, f.message);
        lock(&self.state).last_error = Some(f.clone());
        self.set_status(SyncStatus::Error);
        self.idle_at = Some(Instant::now() + self.config.status_hold());
        f
    }

    fn resolve_flush(&mut self, result: Result<(), SyncFailure>) {
        for reply in self.current_flush.drain(..) {
            let _ = reply.send(result.clone());
        }
    }

    fn resolve_discover(&mut self, result: Result<Option<RemoteHandle>, SyncFailure>) {
        for reply in self.current_discover.drain(..) {
            let _ = reply.send(result.clone());
        }
    }

    fn status(&self) -> SyncStatus {
        lock(&self.state).status
    }

    fn set_status(&mut self, status: SyncStatus) {
        {
            let mut state = lock(&self.state);
            if state.status == status {
                return;
            }
            state.status = status;
        }
        log::debug!(target: "taskboard.sync", "Status -> {}", status);
        let _ = self.events.send(SyncEvent::StatusChanged { status });
    }

    fn blocked(&self) -> Option<String> {
        lock(&self.state).blocked.clone()
    }
}

/// Whether a discovered remote document replaces the local one.
///
/// With a recency stamp on the remote, it must be strictly newer than the
/// local stamp (an unstamped local document is older than any stamp). An
/// unstamped remote wins only on the first discovery after the adapter is
/// configured; later on the local document stands and is pushed over it.
pub fn remote_wins(local: &BoardDocument, remote: &BoardDocument, initial_discovery: bool) -> bool {
    match (remote.updated_at, local.updated_at) {
        (Some(remote_at), Some(local_at)) => remote_at > local_at,
        (Some(_), None) => true,
        (None, _) => initial_discovery,
    }
}

async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T, SyncError>>,
) -> Result<T, SyncError> {
    match timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(limit)),
    }
}

async fn discover_and_pull(
    adapter: Arc<dyn RemoteAdapter>,
    known: Option<RemoteHandle>,
    limit: Duration,
) -> Result<Discovery, SyncError> {
    let found = bounded(limit, adapter.discover()).await?;
    let Some(handle) = found.or(known) else {
        return Ok(Discovery {
            handle: None,
            remote: None,
        });
    };

    match bounded(limit, adapter.pull(&handle)).await {
        Ok(remote) => Ok(Discovery {
            handle: Some(handle),
            remote: Some(remote),
        }),
        Err(SyncError::NotFound(what)) => {
            log::info!(target: "taskboard.sync", "Remote board not there yet: {}", what);
            Ok(Discovery {
                handle: None,
                remote: None,
            })
        }
        Err(e) => Err(e),
    }
}
