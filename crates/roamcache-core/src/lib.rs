//! Offline synchronization layer for the roamcache travel client.
//!
//! - `storage`: async key-value persistence
//! - `cache`: expiring entries over the store
//! - `network`: reachability polling with change notifications
//! - `queue`: mutations recorded offline, replayed in order on reconnect
//! - `offline`: resource accessors that fall back to the cache
//! - `sync`: the assembled context with its start/stop lifecycle

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod geo;
pub mod listeners;
pub mod models;
pub mod network;
pub mod offline;
pub mod queue;
pub mod storage;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError, TravelApi};
pub use cache::{CacheKind, CacheTtl, OfflineCache};
pub use config::Config;
pub use network::{HttpProbe, ManualProbe, NetworkMonitor, ReachabilityProbe};
pub use offline::{MutationOutcome, OfflineError, OfflineRepository, SaveReport};
pub use queue::{DrainReport, OfflineQueue, PendingAction, QueuedAction};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use sync::OfflineSync;
