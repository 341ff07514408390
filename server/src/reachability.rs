// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;

use gs_elements::liveness_trait::LivenessProbeTrait;
use gs_elements::sync_error::SyncError;

// Liveness probe using the system `ping` utility (one ICMP echo request).
#[derive(Debug, Default)]
pub struct PingProbe {}

#[async_trait]
impl LivenessProbeTrait for PingProbe {
    async fn probe(&self, host: &str, timeout: Duration) -> bool {
        // A host starting with '-' would be taken as a ping option.
        if host.is_empty() || host.starts_with('-') {
            return false;
        }
        // ping's -W takes whole seconds.
        let wait_secs = std::cmp::max(1, timeout.as_secs_f64().ceil() as u64);
        let child = Command::new("ping")
            .args(["-c", "1", "-W", &wait_secs.to_string(), host])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not run ping: {:?}", e);
                return false;
            }
        };
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!("Error waiting for ping: {:?}", e);
                false
            },
            Err(_) => false,
        }
    }
}

// Sends a single liveness probe to `host`; true only if it answered within
// `timeout`. Never fails.
pub async fn is_reachable(host: &str, timeout: Duration) -> bool {
    PingProbe::default().probe(host, timeout).await
}

// Liveness precondition for remote operations on the camera.
pub struct ReachabilityGate {
    probe: Arc<dyn LivenessProbeTrait + Send + Sync>,
    host: String,

    // Used for single-shot checks ahead of writes.
    probe_timeout: Duration,

    // Used for each attempt of check_with_retries().
    retry_probe_timeout: Duration,
    attempts: u32,
}

impl ReachabilityGate {
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    pub fn new(probe: Arc<dyn LivenessProbeTrait + Send + Sync>,
               host: &str,
               probe_timeout: Duration,
               retry_probe_timeout: Duration) -> Self {
        ReachabilityGate{
            probe,
            host: host.to_string(),
            probe_timeout,
            retry_probe_timeout,
            attempts: Self::DEFAULT_ATTEMPTS,
        }
    }

    // One probe with the short timeout.
    pub async fn check(&self) -> Result<(), SyncError> {
        if self.probe.probe(&self.host, self.probe_timeout).await {
            return Ok(());
        }
        warn!("Camera {} did not respond within {:?}", self.host, self.probe_timeout);
        Err(SyncError::DeviceUnreachable{host: self.host.clone(), attempts: 1})
    }

    // Up to `attempts` probes, each with the longer timeout.
    pub async fn check_with_retries(&self) -> Result<(), SyncError> {
        for attempt in 1..=self.attempts {
            if self.probe.probe(&self.host, self.retry_probe_timeout).await {
                if attempt > 1 {
                    info!("Camera {} responded on attempt {}", self.host, attempt);
                }
                return Ok(());
            }
            warn!("Camera {} not responding (attempt {}/{})",
                  self.host, attempt, self.attempts);
        }
        Err(SyncError::DeviceUnreachable{host: self.host.clone(),
                                         attempts: self.attempts})
    }
}
