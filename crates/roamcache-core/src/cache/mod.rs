//! Local caching module for offline data access.
//!
//! This module provides the `OfflineCache` for storing and retrieving
//! API responses through a `KeyValueStore`. Every entry carries an
//! absolute expiry; reads of expired entries evict them.
//!
//! Lifetimes are 24 hours for normal write-through caching and 7 days for
//! bulk "save for offline" downloads (see `CacheTtl`).

pub mod manager;

pub use manager::{CacheEntryInfo, CacheKind, CacheTtl, OfflineCache, CACHE_PREFIX};
