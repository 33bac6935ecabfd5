//! Callback registry shared by the network monitor and the offline queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct Listeners<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T: Clone> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener<T>)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `f`; returns the id and the listener count after adding.
    pub fn subscribe(&self, f: Listener<T>) -> (ListenerId, usize) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries();
        entries.push((id, f));
        (id, entries.len())
    }

    /// Remove by id. Returns the listener count after removal, or None if
    /// the id was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> Option<usize> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        (entries.len() != before).then_some(entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Call every listener with `value`. Listeners run outside the lock, so
    /// they may subscribe or unsubscribe.
    pub fn notify(&self, value: T) {
        let snapshot: Vec<Listener<T>> = self.entries().iter().map(|(_, f)| Arc::clone(f)).collect();
        for listener in snapshot {
            listener(value.clone());
        }
    }
}

impl<T: Clone> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}
