// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::sync::Arc;
use std::time::Duration;

use gs_elements::action_runner_trait::ActionRunnerTrait;
use gs_elements::device_state::{ChangeSet, DeviceSnapshot, DispatchReport};
use gs_elements::liveness_trait::LivenessProbeTrait;
use gs_elements::sync_error::SyncError;

use crate::field_dispatcher::FieldUpdateDispatcher;
use crate::reachability::ReachabilityGate;
use crate::remote_reader::RemoteConfigReader;

// Reads and updates the camera's settings, checking that the camera is alive
// before each remote operation.
pub struct CameraSync {
    gate: ReachabilityGate,
    reader: RemoteConfigReader,
    dispatcher: FieldUpdateDispatcher,
}

impl CameraSync {
    pub fn new(runner: Arc<dyn ActionRunnerTrait + Send + Sync>,
               probe: Arc<dyn LivenessProbeTrait + Send + Sync>,
               camera_host: &str,
               remote_timeout: Duration,
               probe_timeout: Duration,
               retry_probe_timeout: Duration) -> Self {
        CameraSync{
            gate: ReachabilityGate::new(probe, camera_host,
                                        probe_timeout, retry_probe_timeout),
            reader: RemoteConfigReader::new(runner.clone(), remote_timeout),
            dispatcher: FieldUpdateDispatcher::new(runner, remote_timeout),
        }
    }

    // Reads are user triggered and infrequent, so the liveness check is
    // retried with a longer timeout. No snapshot is returned if the camera
    // never responds.
    pub async fn load_config(&self) -> Result<DeviceSnapshot, SyncError> {
        self.gate.check_with_retries().await?;
        Ok(self.reader.fetch_snapshot().await)
    }

    pub async fn update_config(&self, changes: &ChangeSet)
                               -> Result<DispatchReport, SyncError> {
        if changes.is_empty() {
            return Err(SyncError::NoChanges);
        }
        self.gate.check().await?;
        self.dispatcher.apply_changes(changes).await
    }
}
