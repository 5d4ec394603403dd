pub mod board;
pub mod config;
pub mod migrate;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod types;

pub use board::{Board, BoardError};
pub use config::SyncConfig;
pub use remote::{Capabilities, ErrorClass, RemoteAdapter, RemoteHandle, SyncError};
pub use storage::dir::DirRecordStore;
pub use storage::memory::MemoryRecordStore;
pub use sync::{AdapterKind, Credential, SyncEvent, SyncReport, SyncStatus};
pub use types::{BoardDocument, Card, Column, Effort, Priority, CURRENT_VERSION};
