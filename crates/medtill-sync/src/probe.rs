//! # Connectivity Probe
//!
//! Answers one question before a sale leaves the device: is the server
//! reachable right now? A wrong "online" costs one failed request (the
//! sale is then queued as uncertain); a wrong "offline" only delays it.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::submitter::normalize_base;

/// Reports whether the server can currently be reached.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe flipped by the host application (OS network events, UI toggle).
#[derive(Debug)]
pub struct ManualProbe {
    online: AtomicBool,
}

impl ManualProbe {
    pub fn new(online: bool) -> Self {
        ManualProbe {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Probe that calls `GET /health` on the register server.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    health_url: Url,
}

impl HttpProbe {
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        let health_url = normalize_base(base_url)?.join("health")?;
        Ok(HttpProbe { client, health_url })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.client.get(self.health_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_probe_toggles() {
        let probe = ManualProbe::new(false);
        assert!(!probe.is_online().await);
        probe.set_online(true);
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_is_offline() {
        // Port 9 (discard) on localhost is closed in test environments
        let probe = HttpProbe::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(!probe.is_online().await);
    }
}
