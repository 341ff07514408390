// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use gs_elements::action_runner_trait::{ActionRequest, ActionRunnerTrait};
use gs_elements::camera_fields::{CAMERA_FIELDS, ConfigSource};
use gs_elements::device_state::DeviceSnapshot;
use gs_elements::remote_formats::{parse_flat_config, parse_structured_section};
use gs_elements::sync_error::SyncError;

pub const READ_FLAT_ACTION: &str = "read_wfb_config";
pub const READ_STRUCTURED_ACTION: &str = "read_majestic_config";

// Printed by the structured read action ahead of the YAML document.
pub const STRUCTURED_BANNER: &str = "Reading majestic configuration";
pub const STRUCTURED_SECTION: &str = "video0";

// Fetches the camera's current settings from its two config subsystems and
// merges them into a DeviceSnapshot.
pub struct RemoteConfigReader {
    runner: Arc<dyn ActionRunnerTrait + Send + Sync>,
    timeout: Duration,
}

impl RemoteConfigReader {
    pub fn new(runner: Arc<dyn ActionRunnerTrait + Send + Sync>,
               timeout: Duration) -> Self {
        RemoteConfigReader{runner, timeout}
    }

    // Always returns a complete snapshot. A source that cannot be read or
    // parsed contributes nothing, its fields take their defaults, and the
    // failure is recorded in `degraded`.
    pub async fn fetch_snapshot(&self) -> DeviceSnapshot {
        let mut degraded = Vec::new();

        let flat_values = match self.read_source(READ_FLAT_ACTION).await {
            Ok(text) => parse_flat_config(&text),
            Err(reason) => {
                degraded.push(Self::degraded(ConfigSource::Flat, reason));
                BTreeMap::new()
            }
        };
        let structured_values = match self.read_source(READ_STRUCTURED_ACTION).await {
            Ok(text) => match parse_structured_section(
                &text, STRUCTURED_BANNER, STRUCTURED_SECTION)
            {
                Ok(values) => values,
                Err(reason) => {
                    degraded.push(Self::degraded(ConfigSource::Structured, reason));
                    BTreeMap::new()
                }
            },
            Err(reason) => {
                degraded.push(Self::degraded(ConfigSource::Structured, reason));
                BTreeMap::new()
            }
        };

        let snapshot = merge_sources(&flat_values, &structured_values, degraded);
        debug!("Camera snapshot: {:?}", snapshot.values);
        snapshot
    }

    async fn read_source(&self, action: &str) -> Result<String, String> {
        match self.runner.run_action(&ActionRequest::new(action), self.timeout).await {
            Ok(output) if output.success() => Ok(output.stdout),
            Ok(output) => Err(format!("{} exited with status {:?}",
                                      action, output.exit_status)),
            Err(e) => Err(format!("{} failed: {}", action, e.message)),
        }
    }

    fn degraded(source: ConfigSource, reason: String) -> SyncError {
        let e = SyncError::ParseDegraded{source_name: source.name().to_string(),
                                         reason};
        warn!("{}; using defaults", e);
        e
    }
}

// Builds a snapshot holding every field of CAMERA_FIELDS, taking each value
// from the field's source and falling back to its default.
pub fn merge_sources(flat_values: &BTreeMap<String, String>,
                     structured_values: &BTreeMap<String, String>,
                     degraded: Vec<SyncError>) -> DeviceSnapshot {
    let mut values = BTreeMap::new();
    for field in CAMERA_FIELDS.iter() {
        let source_values = match field.source {
            ConfigSource::Flat => flat_values,
            ConfigSource::Structured => structured_values,
        };
        let value = source_values.get(field.source_key)
            .cloned()
            .unwrap_or_else(|| field.default_value.to_string());
        values.insert(field.name.to_string(), value);
    }
    DeviceSnapshot{values, degraded}
}
