use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Probe request timeout, shorter than the default poll interval
const PROBE_TIMEOUT_SECS: u64 = 3;

/// Answers "is the device connected and is the internet reachable?"
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Reachability by HEAD request to a known URL.
/// Transport errors and 5xx responses count as unreachable.
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                debug!(url = %self.url, error = %e, "Reachability check failed");
                false
            }
        }
    }
}

/// A probe whose answer is set by the host, e.g. for a forced offline mode.
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityProbe for ManualProbe {
    async fn check(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
