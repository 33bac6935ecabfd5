use std::sync::Arc;

use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::TravelApi;
use crate::clock::{Clock, SystemClock};
use crate::listeners::{ListenerId, Listeners};
use crate::storage::KeyValueStore;

use super::{PendingAction, QueuedAction};

/// Store key holding the serialized queue
pub const QUEUE_KEY: &str = "@roamcache:offline-queue";

/// Length of the random part of a queued action id
const ID_SUFFIX_LEN: usize = 9;

/// Outcome of one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub replayed: usize,
    pub failed: usize,
    pub remaining: usize,
}

struct QueueInner {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write of the persisted list
    write_lock: Mutex<()>,
    /// Held for the duration of a drain
    drain_lock: Mutex<()>,
    listeners: Listeners<usize>,
}

/// FIFO of mutations recorded while offline, persisted under `QUEUE_KEY`.
///
/// Actions are never merged or deduplicated. A drain replays them in order
/// and removes each one only after its API call succeeds; failures stay
/// queued for the next drain.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<QueueInner>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                clock,
                write_lock: Mutex::new(()),
                drain_lock: Mutex::new(()),
                listeners: Listeners::new(),
            }),
        }
    }

    fn new_id(&self) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        format!("{}-{}", self.inner.clock.now().timestamp_millis(), suffix)
    }

    async fn load(&self) -> Result<Vec<QueuedAction>> {
        let raw = self
            .inner
            .store
            .get(QUEUE_KEY)
            .await
            .context("Failed to read offline queue")?;
        match raw {
            Some(raw) => serde_json::from_str(&raw).context("Failed to parse offline queue"),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, actions: &[QueuedAction]) -> Result<()> {
        let contents = serde_json::to_string(actions)?;
        self.inner
            .store
            .set(QUEUE_KEY, contents)
            .await
            .context("Failed to write offline queue")
    }

    /// Queued actions in submission order. A queue that cannot be read is
    /// reported as empty.
    pub async fn pending(&self) -> Vec<QueuedAction> {
        match self.load().await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(error = %e, "Treating unreadable offline queue as empty");
                Vec::new()
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.pending().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Append `action` to the queue.
    pub async fn enqueue(&self, action: PendingAction) -> Result<QueuedAction> {
        let queued = QueuedAction {
            id: self.new_id(),
            action,
            created_at: self.inner.clock.now(),
        };

        let len = {
            let _guard = self.inner.write_lock.lock().await;
            let mut actions = self.load().await?;
            actions.push(queued.clone());
            self.save(&actions).await?;
            actions.len()
        };

        info!(id = %queued.id, kind = %queued.kind(), queued = len, "Action queued for replay");
        self.inner.listeners.notify(len);
        Ok(queued)
    }

    /// Remove one action by id. Returns false if it was not queued.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let len = {
            let _guard = self.inner.write_lock.lock().await;
            let mut actions = self.load().await?;
            let before = actions.len();
            actions.retain(|a| a.id != id);
            if actions.len() == before {
                return Ok(false);
            }
            self.save(&actions).await?;
            actions.len()
        };

        self.inner.listeners.notify(len);
        Ok(true)
    }

    /// Drop every queued action without replaying it.
    pub async fn clear(&self) -> Result<()> {
        {
            let _guard = self.inner.write_lock.lock().await;
            self.inner
                .store
                .remove(QUEUE_KEY)
                .await
                .context("Failed to clear offline queue")?;
        }
        info!("Offline queue cleared");
        self.inner.listeners.notify(0);
        Ok(())
    }

    /// Be told the queue length whenever it changes.
    pub fn subscribe<F>(&self, f: F) -> ListenerId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(Arc::new(f)).0
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.listeners.unsubscribe(id);
    }

    /// Replay every queued action in order against `api`.
    ///
    /// Returns None without doing anything if another drain is running.
    pub async fn drain(&self, api: &dyn TravelApi) -> Option<DrainReport> {
        let Ok(_drain_guard) = self.inner.drain_lock.try_lock() else {
            debug!("Drain already in progress, skipping");
            return None;
        };
        Some(self.replay_all(api).await)
    }

    /// Like `drain`, but waits for a running drain to finish and then
    /// replays whatever is still queued.
    pub async fn flush(&self, api: &dyn TravelApi) -> DrainReport {
        let _drain_guard = self.inner.drain_lock.lock().await;
        self.replay_all(api).await
    }

    async fn replay_all(&self, api: &dyn TravelApi) -> DrainReport {
        let actions = self.pending().await;
        if actions.is_empty() {
            return DrainReport::default();
        }
        info!(count = actions.len(), "Replaying offline queue");

        let mut report = DrainReport::default();
        for queued in &actions {
            match queued.action.replay(api).await {
                Ok(()) => {
                    report.replayed += 1;
                    if let Err(e) = self.remove(&queued.id).await {
                        warn!(id = %queued.id, error = %e, "Replayed action could not be removed from queue");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(id = %queued.id, kind = %queued.kind(), error = %e, "Replay failed, leaving action queued");
                }
            }
        }

        report.remaining = self.len().await;
        info!(
            replayed = report.replayed,
            failed = report.failed,
            remaining = report.remaining,
            "Offline queue drained"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockTravelApi;
    use crate::models::NewReview;
    use crate::queue::ActionKind;
    use crate::storage::failing::FailingStore;
    use crate::storage::MemoryStore;
    use std::sync::Mutex as StdMutex;

    fn setup() -> (OfflineQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (OfflineQueue::new(store.clone()), store)
    }

    fn review(place_id: i64) -> PendingAction {
        PendingAction::CreateReview(NewReview {
            place_id,
            rating: 4,
            comment: None,
        })
    }

    #[tokio::test]
    async fn test_enqueue_preserves_order_and_persists() {
        let (queue, store) = setup();
        queue.enqueue(PendingAction::AddFavorite { place_id: 1 }).await.unwrap();
        queue.enqueue(PendingAction::RemoveFavorite { place_id: 1 }).await.unwrap();
        queue.enqueue(review(2)).await.unwrap();

        // A second handle over the same store sees the same queue
        let reopened = OfflineQueue::new(store);
        let kinds: Vec<_> = reopened.pending().await.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::AddFavorite,
                ActionKind::RemoveFavorite,
                ActionKind::CreateReview,
            ]
        );
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (queue, _) = setup();
        let a = queue.enqueue(PendingAction::MarkVisited { place_id: 1 }).await.unwrap();
        let b = queue.enqueue(PendingAction::MarkVisited { place_id: 1 }).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.split_once('-').map(|(_, s)| s.len()), Some(ID_SUFFIX_LEN));
    }

    #[tokio::test]
    async fn test_drain_success_empties_queue_and_notifies_zero() {
        let (queue, _) = setup();
        let api = MockTravelApi::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        queue.subscribe(move |len| sink.lock().unwrap().push(len));

        queue.enqueue(PendingAction::MarkVisited { place_id: 1 }).await.unwrap();
        queue.enqueue(PendingAction::AddFavorite { place_id: 2 }).await.unwrap();
        queue.enqueue(review(3)).await.unwrap();

        let report = queue.drain(&api).await.unwrap();
        assert_eq!(report, DrainReport { replayed: 3, failed: 0, remaining: 0 });
        assert!(queue.is_empty().await);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 2, 1, 0]);
        assert_eq!(api.calls(), vec!["mark_visited:1", "add_favorite:2", "create_review:3"]);
    }

    #[tokio::test]
    async fn test_failed_replay_stays_queued() {
        let (queue, _) = setup();
        let api = MockTravelApi::new();
        api.fail("add_favorite");

        queue.enqueue(PendingAction::MarkVisited { place_id: 1 }).await.unwrap();
        let stuck = queue.enqueue(PendingAction::AddFavorite { place_id: 2 }).await.unwrap();
        queue.enqueue(review(3)).await.unwrap();

        let report = queue.drain(&api).await.unwrap();
        assert_eq!(report, DrainReport { replayed: 2, failed: 1, remaining: 1 });
        assert_eq!(queue.pending().await, vec![stuck.clone()]);

        // Retried on the next drain
        api.recover("add_favorite");
        let report = queue.drain(&api).await.unwrap();
        assert_eq!(report.replayed, 1);
        assert!(queue.is_empty().await);
        assert_eq!(api.call_count("add_favorite"), 2);
    }

    #[tokio::test]
    async fn test_flush_waits_for_running_drain() {
        let (queue, _) = setup();
        let api = Arc::new(MockTravelApi::new());
        queue.enqueue(PendingAction::AddFavorite { place_id: 5 }).await.unwrap();

        let guard = queue.inner.drain_lock.lock().await;
        assert!(queue.drain(api.as_ref()).await.is_none());

        let flushing = {
            let queue = queue.clone();
            let api = Arc::clone(&api);
            tokio::spawn(async move { queue.flush(api.as_ref()).await })
        };
        tokio::task::yield_now().await;
        assert!(api.calls().is_empty());

        drop(guard);
        let report = flushing.await.unwrap();
        assert_eq!(report, DrainReport { replayed: 1, failed: 0, remaining: 0 });
        assert_eq!(api.calls(), vec!["add_favorite:5"]);
    }

    #[tokio::test]
    async fn test_double_toggle_replays_both() {
        let (queue, _) = setup();
        let api = MockTravelApi::new();
        queue.enqueue(PendingAction::AddFavorite { place_id: 5 }).await.unwrap();
        queue.enqueue(PendingAction::RemoveFavorite { place_id: 5 }).await.unwrap();

        queue.drain(&api).await.unwrap();
        assert_eq!(api.calls(), vec!["add_favorite:5", "remove_favorite:5"]);
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_are_not_lost() {
        let (queue, _) = setup();
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    queue.enqueue(PendingAction::MarkVisited { place_id: i }).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(queue.len().await, 20);
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let (queue, store) = setup();
        let a = queue.enqueue(PendingAction::MarkVisited { place_id: 1 }).await.unwrap();
        queue.enqueue(PendingAction::MarkVisited { place_id: 2 }).await.unwrap();

        assert!(queue.remove(&a.id).await.unwrap());
        assert!(!queue.remove(&a.id).await.unwrap());
        assert_eq!(queue.len().await, 1);

        queue.clear().await.unwrap();
        assert!(queue.is_empty().await);
        assert_eq!(store.get(QUEUE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_queue_reads_as_empty_but_blocks_enqueue() {
        let (queue, store) = setup();
        store.set(QUEUE_KEY, "{oops".to_string()).await.unwrap();

        assert!(queue.pending().await.is_empty());
        assert!(queue.enqueue(PendingAction::MarkVisited { place_id: 1 }).await.is_err());
        // The unreadable data was not overwritten
        assert_eq!(store.get(QUEUE_KEY).await.unwrap(), Some("{oops".to_string()));
    }

    #[tokio::test]
    async fn test_storage_read_failure() {
        let store = Arc::new(FailingStore::new());
        let queue = OfflineQueue::new(store.clone());
        let api = MockTravelApi::new();
        queue.enqueue(PendingAction::AddFavorite { place_id: 1 }).await.unwrap();

        store.fail("get");
        assert!(queue.pending().await.is_empty());
        assert_eq!(queue.len().await, 0);
        assert!(queue.enqueue(PendingAction::MarkVisited { place_id: 2 }).await.is_err());
        assert_eq!(queue.drain(&api).await, Some(DrainReport::default()));
        assert!(api.calls().is_empty());

        // Nothing was lost while the store was failing
        store.recover("get");
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_storage_write_failure_keeps_replayed_action() {
        let store = Arc::new(FailingStore::new());
        let queue = OfflineQueue::new(store.clone());
        let api = MockTravelApi::new();
        queue.enqueue(PendingAction::AddFavorite { place_id: 1 }).await.unwrap();

        store.fail("set");
        assert!(queue.enqueue(PendingAction::MarkVisited { place_id: 2 }).await.is_err());
        let report = queue.drain(&api).await.unwrap();
        assert_eq!(report, DrainReport { replayed: 1, failed: 0, remaining: 1 });
        assert_eq!(api.calls(), vec!["add_favorite:1"]);
    }
}
