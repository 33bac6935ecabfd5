//! Offline action queue.
//!
//! Mutations made while offline (reviews, visits, favorite changes) are
//! recorded here and replayed in submission order once the network is back.

pub mod action;
pub mod manager;

pub use action::{ActionKind, PendingAction, QueuedAction};
pub use manager::{DrainReport, OfflineQueue, QUEUE_KEY};
