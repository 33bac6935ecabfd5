use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::listeners::{ListenerId, Listeners};

use super::ReachabilityProbe;

/// How often reachability is checked while polling.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

struct MonitorInner {
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    online: AtomicBool,
    suspended: AtomicBool,
    listeners: Listeners<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

/// Connectivity state plus the poll loop that keeps it current.
///
/// The state starts as online. Listeners are called only when a poll sees
/// a different answer than the previous one. The loop starts with the first
/// subscriber and stops when the last one leaves; `suspend`/`resume` stop
/// and restart it for app backgrounding.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

impl NetworkMonitor {
    pub fn new(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self::with_interval(probe, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(probe: Arc<dyn ReachabilityProbe>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                interval,
                online: AtomicBool::new(true),
                suspended: AtomicBool::new(false),
                listeners: Listeners::new(),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Be told `true`/`false` on every connectivity transition.
    pub fn subscribe<F>(&self, f: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let (id, count) = self.inner.listeners.subscribe(Arc::new(f));
        if count == 1 {
            self.start_polling();
        }
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        if self.inner.listeners.unsubscribe(id) == Some(0) {
            self.stop_polling();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Stop polling until `resume`, e.g. while the app is in the background.
    pub fn suspend(&self) {
        self.inner.suspended.store(true, Ordering::SeqCst);
        self.stop_polling();
    }

    /// Restart polling if anyone is subscribed.
    pub fn resume(&self) {
        self.inner.suspended.store(false, Ordering::SeqCst);
        if !self.inner.listeners.is_empty() {
            self.start_polling();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one reachability check, notifying listeners if the state flipped.
    /// Returns the current state.
    pub async fn tick(&self) -> bool {
        let online = self.inner.probe.check().await;
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if was_online != online {
            info!(online = online, "Network state changed");
            self.inner.listeners.notify(online);
        }
        online
    }

    fn poller(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.poller.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_polling(&self) {
        if self.inner.suspended.load(Ordering::SeqCst) {
            return;
        }
        let mut poller = self.poller();
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, network polling not started");
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        *poller = Some(runtime.spawn(poll_loop(weak, interval)));
        debug!(interval_ms = interval.as_millis() as u64, "Network polling started");
    }

    fn stop_polling(&self) {
        if let Some(handle) = self.poller().take() {
            handle.abort();
            debug!("Network polling stopped");
        }
    }
}

async fn poll_loop(inner: Weak<MonitorInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        NetworkMonitor { inner }.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ManualProbe;
    use std::sync::Mutex as StdMutex;

    fn setup() -> (NetworkMonitor, Arc<ManualProbe>) {
        let probe = Arc::new(ManualProbe::new(true));
        let monitor = NetworkMonitor::with_interval(probe.clone(), Duration::from_secs(3600));
        (monitor, probe)
    }

    #[tokio::test]
    async fn test_notifies_once_per_transition() {
        let (monitor, probe) = setup();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.subscribe(move |online| sink.lock().unwrap().push(online));

        // online -> online: nothing
        monitor.tick().await;
        probe.set_online(false);
        monitor.tick().await;
        monitor.tick().await;
        monitor.tick().await;
        probe.set_online(true);
        monitor.tick().await;
        monitor.tick().await;

        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_polling_follows_listener_count() {
        let (monitor, _) = setup();
        assert!(!monitor.is_polling());

        let a = monitor.subscribe(|_| {});
        assert!(monitor.is_polling());
        let b = monitor.subscribe(|_| {});

        monitor.unsubscribe(a);
        assert!(monitor.is_polling());
        monitor.unsubscribe(b);
        assert!(!monitor.is_polling());
        assert_eq!(monitor.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_suspend_and_resume() {
        let (monitor, _) = setup();
        monitor.subscribe(|_| {});

        monitor.suspend();
        assert!(!monitor.is_polling());

        // Subscribing while suspended does not restart the loop
        monitor.subscribe(|_| {});
        assert!(!monitor.is_polling());

        monitor.resume();
        assert!(monitor.is_polling());
    }

    #[tokio::test]
    async fn test_resume_without_listeners_stays_idle() {
        let (monitor, _) = setup();
        monitor.suspend();
        monitor.resume();
        assert!(!monitor.is_polling());
    }

    #[tokio::test]
    async fn test_poll_loop_detects_change() {
        let probe = Arc::new(ManualProbe::new(false));
        let monitor = NetworkMonitor::with_interval(probe.clone(), Duration::from_millis(10));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        monitor.subscribe(move |online| {
            let _ = tx.send(online);
        });

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(first, Some(false));

        probe.set_online(true);
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(second, Some(true));
    }
}
