use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::storage::{KeyValueStore, StorageError};

/// Prefix shared by every cache key (values and expiries).
/// `clear()` removes everything under it.
pub const CACHE_PREFIX: &str = "@roamcache:cache";

const VALUE_PREFIX: &str = "@roamcache:cache:";
const EXPIRY_PREFIX: &str = "@roamcache:cache-expiry:";

/// Cache lifetimes.
pub struct CacheTtl;

impl CacheTtl {
    /// Write-through entries from normal browsing
    pub const DEFAULT: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr
    /// Bulk "save for offline" downloads
    pub const OFFLINE: Duration = Duration::from_secs(7 * 24 * 60 * 60); // 7 days
}

/// Resource namespaces within the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Place,
    Places,
    Popular,
    Nearby,
    Route,
    Routes,
    Itinerary,
    Itineraries,
    Favorites,
    Visited,
}

impl CacheKind {
    pub const ALL: [CacheKind; 10] = [
        CacheKind::Place,
        CacheKind::Places,
        CacheKind::Popular,
        CacheKind::Nearby,
        CacheKind::Route,
        CacheKind::Routes,
        CacheKind::Itinerary,
        CacheKind::Itineraries,
        CacheKind::Favorites,
        CacheKind::Visited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Place => "place",
            CacheKind::Places => "places",
            CacheKind::Popular => "popular",
            CacheKind::Nearby => "nearby",
            CacheKind::Route => "route",
            CacheKind::Routes => "routes",
            CacheKind::Itinerary => "itinerary",
            CacheKind::Itineraries => "itineraries",
            CacheKind::Favorites => "favorites",
            CacheKind::Visited => "visited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn value_key(kind: CacheKind, id: &str) -> String {
    format!("{}{}:{}", VALUE_PREFIX, kind, id)
}

fn expiry_key(kind: CacheKind, id: &str) -> String {
    format!("{}{}:{}", EXPIRY_PREFIX, kind, id)
}

/// Describes one live cache entry, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryInfo {
    pub kind: CacheKind,
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntryInfo {
    /// Human-readable time left, e.g. "5h", "6d", "expired"
    pub fn expires_display(&self, now: DateTime<Utc>) -> String {
        let minutes = (self.expires_at - now).num_minutes();
        if minutes < 0 {
            "expired".to_string()
        } else if minutes < 1 {
            "<1m".to_string()
        } else if minutes < 60 {
            format!("{}m", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h", hours + 1)
            } else {
                format!("{}h", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d", days + 1)
            } else {
                format!("{}d", days)
            }
        }
    }
}

/// Expiring JSON cache over a key-value store.
///
/// Each entry is two keys written in one batch: the serialized value and
/// its absolute expiry in epoch milliseconds. Expired entries are evicted
/// lazily when read. Storage failures on read are logged and treated as a
/// miss.
#[derive(Clone)]
pub struct OfflineCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl OfflineCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store `value` under (kind, id), visible for `ttl`.
    pub async fn put<T: Serialize + ?Sized + Sync>(
        &self,
        kind: CacheKind,
        id: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let contents = serde_json::to_string(value)?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = self.clock.now().timestamp_millis().saturating_add(ttl_ms);

        self.store
            .multi_set(vec![
                (value_key(kind, id), contents),
                (expiry_key(kind, id), expires_at.to_string()),
            ])
            .await?;
        debug!(kind = %kind, id = id, ttl_secs = ttl.as_secs(), "Cached");
        Ok(())
    }

    /// Read (kind, id) if present and unexpired.
    pub async fn get<T: DeserializeOwned>(&self, kind: CacheKind, id: &str) -> Option<T> {
        let raw = self.get_raw(kind, id).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(kind = %kind, id = id, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(kind = %kind, id = id, error = %e, "Failed to decode cached value");
                None
            }
        }
    }

    /// Time left before (kind, id) expires, if it is live.
    pub async fn remaining_ttl(&self, kind: CacheKind, id: &str) -> Option<chrono::Duration> {
        let expiry = match self.store.get(&expiry_key(kind, id)).await {
            Ok(Some(raw)) => parse_expiry(&raw)?,
            Ok(None) => return None,
            Err(e) => {
                warn!(kind = %kind, id = id, error = %e, "Failed to read cache expiry");
                return None;
            }
        };
        let remaining = expiry - self.clock.now();
        (remaining > chrono::Duration::zero()).then_some(remaining)
    }

    async fn get_raw(&self, kind: CacheKind, id: &str) -> Option<String> {
        let keys = [value_key(kind, id), expiry_key(kind, id)];
        let mut values = match self.store.multi_get(&keys).await {
            Ok(values) => values,
            Err(e) => {
                warn!(kind = %kind, id = id, error = %e, "Failed to read cache entry");
                return None;
            }
        };
        let expiry = values.pop().flatten();
        let value = values.pop().flatten();

        let live = match expiry.as_deref().and_then(parse_expiry) {
            Some(expires_at) => self.clock.now() < expires_at,
            // A value without a readable expiry is never trusted
            None => false,
        };

        if live && value.is_some() {
            return value;
        }

        if value.is_some() || expiry.is_some() {
            debug!(kind = %kind, id = id, "Evicting expired cache entry");
            if let Err(e) = self.store.multi_remove(&keys).await {
                warn!(kind = %kind, id = id, error = %e, "Failed to evict cache entry");
            }
        } else {
            debug!(kind = %kind, id = id, "Cache miss");
        }
        None
    }

    /// Remove (kind, id) regardless of expiry.
    pub async fn remove(&self, kind: CacheKind, id: &str) -> Result<(), StorageError> {
        self.store
            .multi_remove(&[value_key(kind, id), expiry_key(kind, id)])
            .await
    }

    /// Remove every cache entry. Keys outside the cache namespace
    /// (the offline queue, the session) are untouched.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let keys: Vec<String> = self
            .store
            .all_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(CACHE_PREFIX))
            .collect();
        self.store.multi_remove(&keys).await?;
        let entries = keys.iter().filter(|k| k.starts_with(VALUE_PREFIX)).count();
        debug!(removed_keys = keys.len(), entries = entries, "Cache cleared");
        Ok(entries)
    }

    /// Live entries, soonest to expire first. Does not evict.
    pub async fn entries(&self) -> Result<Vec<CacheEntryInfo>, StorageError> {
        let now = self.clock.now();
        let expiry_keys: Vec<String> = self
            .store
            .all_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(EXPIRY_PREFIX))
            .collect();
        let expiries = self.store.multi_get(&expiry_keys).await?;

        let mut entries: Vec<CacheEntryInfo> = expiry_keys
            .iter()
            .zip(expiries)
            .filter_map(|(key, raw)| {
                let rest = key.strip_prefix(EXPIRY_PREFIX)?;
                let (kind, id) = rest.split_once(':')?;
                let kind = CacheKind::parse(kind)?;
                let expires_at = parse_expiry(raw.as_deref()?)?;
                (expires_at > now).then(|| CacheEntryInfo {
                    kind,
                    id: id.to_string(),
                    expires_at,
                })
            })
            .collect();
        entries.sort_by_key(|e| e.expires_at);
        Ok(entries)
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

// ============================================================================
// Tests
// ============================================================================
