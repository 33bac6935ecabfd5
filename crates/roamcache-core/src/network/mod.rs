//! Network reachability monitoring.
//!
//! `NetworkMonitor` polls a `ReachabilityProbe` at a fixed interval and
//! tells subscribers when connectivity flips. Polling runs only while
//! someone is subscribed and the host has not suspended the monitor.

pub mod monitor;
pub mod probe;

pub use monitor::{NetworkMonitor, DEFAULT_POLL_INTERVAL};
pub use probe::{HttpProbe, ManualProbe, ReachabilityProbe};
