// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use canonical_error::{CanonicalError, deadline_exceeded_error,
                      failed_precondition_error, invalid_argument_error};
use log::{debug, info, warn};
use tokio::process::{Child, Command};

use gs_elements::action_runner_trait::{ActionOutput, ActionRequest,
                                       ActionRunnerTrait};

// Runs camera actions as shell functions defined in a commands script. The
// script is expected to carry out each action against the camera (typically
// over ssh).
pub struct ShellActionRunner {
    commands_script: PathBuf,
}

impl ShellActionRunner {
    pub fn new(commands_script: impl AsRef<Path>) -> Self {
        ShellActionRunner{commands_script: commands_script.as_ref().to_path_buf()}
    }

    // Action names are interpolated into a shell command line, so we accept
    // only shell identifiers.
    pub fn is_valid_action_name(action: &str) -> bool {
        let mut chars = action.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn make_child(&self, request: &ActionRequest) -> Result<Child, CanonicalError> {
        // The script path is passed as $1 rather than spliced into the command
        // string.
        let mut command = Command::new("bash");
        command
            .arg("-c")
            .arg(format!("source \"$1\" && {}", request.action))
            .arg("gs-server")
            .arg(&self.commands_script)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match command.spawn() {
            Err(e) => {
                Err(failed_precondition_error(
                    format!("Command::spawn error for {}: {:?}",
                            request.action, e).as_str()))
            },
            Ok(child) => {
                debug!("Started action {}", request.action);
                Ok(child)
            }
        }
    }

    fn log_stderr(action: &str, output: &Output) {
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            if !line.trim().is_empty() {
                warn!("{}: {}", action, line);
            }
        }
    }
}

#[async_trait]
impl ActionRunnerTrait for ShellActionRunner {
    async fn run_action(&self, request: &ActionRequest, timeout: Duration)
                        -> Result<ActionOutput, CanonicalError> {
        if !Self::is_valid_action_name(&request.action) {
            return Err(invalid_argument_error(
                format!("Invalid action name {:?}", request.action).as_str()));
        }
        info!("Running action {} with {} env var(s)",
              request.action, request.env.len());
        let child = self.make_child(request)?;
        // If the deadline passes, dropping the wait future drops the child,
        // which kills it.
        let output = match tokio::time::timeout(
            timeout, child.wait_with_output()).await
        {
            Err(_) => {
                return Err(deadline_exceeded_error(
                    format!("Action {} did not finish within {:?}",
                            request.action, timeout).as_str()));
            },
            Ok(Err(e)) => {
                return Err(failed_precondition_error(
                    format!("Error waiting for action {}: {:?}",
                            request.action, e).as_str()));
            },
            Ok(Ok(output)) => output,
        };
        Self::log_stderr(&request.action, &output);
        let exit_status = output.status.code();
        if exit_status != Some(0) {
            warn!("Action {} exited with status {:?}", request.action, exit_status);
        }
        Ok(ActionOutput{
            exit_status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
