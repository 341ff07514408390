// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use gs_elements::action_runner_trait::{ActionRequest, ActionRunnerTrait};
use gs_elements::camera_fields::lookup_field;
use gs_elements::device_state::{ChangeSet, DispatchReport, UpdateOutcome,
                                UpdateResult};
use gs_elements::sync_error::SyncError;

// Applies a ChangeSet to the camera, one update action per field.
//
// Processing is fail-fast: the first field whose action fails ends the
// dispatch and later fields are not attempted, since the camera's state is
// then unknown. There is no rollback; fields applied before the failure keep
// their new values.
pub struct FieldUpdateDispatcher {
    runner: Arc<dyn ActionRunnerTrait + Send + Sync>,
    timeout: Duration,
}

impl FieldUpdateDispatcher {
    pub fn new(runner: Arc<dyn ActionRunnerTrait + Send + Sync>,
               timeout: Duration) -> Self {
        FieldUpdateDispatcher{runner, timeout}
    }

    // Returns NoChanges for an empty ChangeSet. Otherwise the report lists one
    // result per attempted field in submission order; fields not in
    // CAMERA_FIELDS are skipped and listed in `ignored`.
    pub async fn apply_changes(&self, changes: &ChangeSet)
                               -> Result<DispatchReport, SyncError> {
        if changes.is_empty() {
            return Err(SyncError::NoChanges);
        }
        let mut report = DispatchReport::default();
        for (name, value) in changes.iter() {
            let field = match lookup_field(name) {
                Some(f) => f,
                None => {
                    debug!("Ignoring unknown field {:?}", name);
                    report.ignored.push(name.to_string());
                    continue;
                }
            };
            let request = ActionRequest::new(field.update_action)
                .with_env(field.remote_env_var, value);
            let failure = match self.runner.run_action(&request, self.timeout).await {
                Ok(output) if output.success() => None,
                Ok(output) => Some(SyncError::RemoteActionFailed{
                    field: field.name.to_string(),
                    exit_status: output.exit_status,
                    reason: format!("{} exited with status {:?}",
                                    field.update_action, output.exit_status)}),
                Err(e) => Some(SyncError::RemoteActionFailed{
                    field: field.name.to_string(),
                    exit_status: None,
                    reason: e.message.clone()}),
            };
            match failure {
                None => {
                    info!("Updated {} to {:?}", field.name, value);
                    report.results.push(UpdateResult{
                        field: field.name.to_string(),
                        outcome: UpdateOutcome::Success});
                },
                Some(e) => {
                    error!("{}; not attempting remaining fields", e);
                    report.results.push(UpdateResult{
                        field: field.name.to_string(),
                        outcome: UpdateOutcome::Failure(e.to_string())});
                    report.failure = Some(e);
                    break;
                }
            }
        }
        Ok(report)
    }
}
