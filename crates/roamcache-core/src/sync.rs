//! Wiring for the offline layer.
//!
//! `OfflineSync` owns one of each component and ties the network monitor to
//! the queue: every transition to online spawns a drain, and so does
//! starting while already online.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::api::TravelApi;
use crate::cache::OfflineCache;
use crate::clock::{Clock, SystemClock};
use crate::listeners::ListenerId;
use crate::network::NetworkMonitor;
use crate::offline::OfflineRepository;
use crate::queue::{DrainReport, OfflineQueue};
use crate::storage::KeyValueStore;

pub struct OfflineSync {
    api: Arc<dyn TravelApi>,
    cache: OfflineCache,
    network: NetworkMonitor,
    queue: OfflineQueue,
    repository: OfflineRepository,
    replay_listener: Mutex<Option<ListenerId>>,
}

impl OfflineSync {
    pub fn new(api: Arc<dyn TravelApi>, store: Arc<dyn KeyValueStore>, network: NetworkMonitor) -> Self {
        Self::with_clock(api, store, network, Arc::new(SystemClock))
    }

    pub fn with_clock(
        api: Arc<dyn TravelApi>,
        store: Arc<dyn KeyValueStore>,
        network: NetworkMonitor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = OfflineCache::with_clock(store.clone(), clock.clone());
        let queue = OfflineQueue::with_clock(store, clock);
        let repository = OfflineRepository::new(api.clone(), cache.clone(), network.clone(), queue.clone());
        Self {
            api,
            cache,
            network,
            queue,
            repository,
            replay_listener: Mutex::new(None),
        }
    }

    pub fn repository(&self) -> &OfflineRepository {
        &self.repository
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    fn replay_listener(&self) -> std::sync::MutexGuard<'_, Option<ListenerId>> {
        self.replay_listener.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start monitoring. Each transition to online replays the queue in a
    /// spawned task. If the network is already online, actions left from
    /// an earlier run are replayed right away. Calling `start` twice has
    /// no further effect.
    pub fn start(&self) {
        let mut listener = self.replay_listener();
        if listener.is_some() {
            return;
        }

        let api = Arc::clone(&self.api);
        let queue = self.queue.clone();
        let id = self.network.subscribe(move |online| {
            if online {
                spawn_drain(&api, &queue);
            }
        });
        *listener = Some(id);
        info!("Offline sync started");

        if self.network.is_online() {
            spawn_drain(&self.api, &self.queue);
        }
    }

    /// Stop monitoring. Polling ends if no other listener remains.
    pub fn stop(&self) {
        if let Some(id) = self.replay_listener().take() {
            self.network.unsubscribe(id);
            info!("Offline sync stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.replay_listener().is_some()
    }

    /// Check connectivity now and, if online, replay the queue.
    /// Returns None when offline or when a drain is already running.
    pub async fn sync_now(&self) -> Option<DrainReport> {
        if !self.network.tick().await {
            debug!("Sync requested while offline");
            return None;
        }
        self.queue.drain(self.api.as_ref()).await
    }

    /// Replay actions queued by an earlier run, using the last known
    /// network state. Returns None when offline, when nothing is queued
    /// or when a drain is already running.
    pub async fn replay_pending(&self) -> Option<DrainReport> {
        if !self.network.is_online() || self.queue.is_empty().await {
            return None;
        }
        self.queue.drain(self.api.as_ref()).await
    }
}

fn spawn_drain(api: &Arc<dyn TravelApi>, queue: &OfflineQueue) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("Online but no async runtime to replay the queue on");
        return;
    };
    let api = Arc::clone(api);
    let queue = queue.clone();
    runtime.spawn(async move {
        if queue.drain(api.as_ref()).await.is_none() {
            debug!("Replay skipped, a drain is already running");
        }
    });
}

impl Drop for OfflineSync {
    fn drop(&mut self) {
        self.stop();
    }
}
