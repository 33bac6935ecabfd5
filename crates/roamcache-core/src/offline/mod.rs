//! Offline-aware access to backend resources.
//!
//! Reads go live when the network is up and write through to the cache;
//! when the network is down (or the live call fails) they are answered
//! from the cache, or derived from the cached place collection. Mutations
//! are queued while offline.

pub mod repository;

use thiserror::Error;

pub use repository::{MutationOutcome, OfflineRepository, SaveReport, DEFAULT_POPULAR_LIMIT};

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("{resource} is not available offline")]
    NotAvailableOffline { resource: String },
}

impl OfflineError {
    pub fn unavailable(resource: impl Into<String>) -> Self {
        OfflineError::NotAvailableOffline {
            resource: resource.into(),
        }
    }
}
