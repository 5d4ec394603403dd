pub mod coordinator;
pub mod state;

pub use coordinator::{remote_wins, AdapterConfig, SyncCoordinator, SyncHandle};
pub use state::{
    AdapterKind, Credential, SyncEvent, SyncFailure, SyncReport, SyncSettings, SyncState,
    SyncStatus,
};
