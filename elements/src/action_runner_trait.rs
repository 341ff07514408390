// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Duration;

use async_trait::async_trait;
use canonical_error::CanonicalError;

// A named action on the camera, e.g. `read_wfb_config` or `update_channel`,
// together with the environment it is to see. The environment applies to this
// invocation only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionRequest {
    pub action: String,
    pub env: Vec<(String, String)>,
}

impl ActionRequest {
    pub fn new(action: &str) -> Self {
        ActionRequest{action: action.to_string(), env: Vec::new()}
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionOutput {
    // None if the action was terminated by a signal.
    pub exit_status: Option<i32>,
    pub stdout: String,
}

impl ActionOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

// If ActionOutput is not returned, an error is returned:
//   InvalidArgument: `action` is not a valid action name.
//   FailedPrecondition: the action could not be started.
//   DeadlineExceeded: the action did not finish within `timeout`. The action
//     may still have taken effect on the device.
#[async_trait]
pub trait ActionRunnerTrait {
    async fn run_action(&self, request: &ActionRequest, timeout: Duration)
                        -> Result<ActionOutput, CanonicalError>;
}
