// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use canonical_error::{CanonicalError, CanonicalErrorCode,
                      aborted_error, data_loss_error, deadline_exceeded_error,
                      internal_error, invalid_argument_error, not_found_error,
                      permission_denied_error, unavailable_error};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("Access denied: {path} is not a whitelisted config file")]
    AccessDenied { path: String },

    #[error("Device {host} is unreachable after {attempts} attempt(s)")]
    DeviceUnreachable { host: String, attempts: u32 },

    #[error("Update of '{field}' failed (exit status {exit_status:?}): {reason}")]
    RemoteActionFailed {
        field: String,
        // None if the action was killed, timed out, or never started.
        exit_status: Option<i32>,
        reason: String,
    },

    #[error("No changes supplied")]
    NoChanges,

    // Never returned as a hard failure; recorded on a degraded DeviceSnapshot.
    #[error("Could not parse {source_name} config: {reason}")]
    ParseDegraded { source_name: String, reason: String },

    #[error("No telemetry record received within {window_ms}ms")]
    TelemetryTimeout { window_ms: u64 },

    #[error("Telemetry did not contain a valid rx record: {reason}")]
    TelemetryMalformed { reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl SyncError {
    pub fn io(path: impl AsRef<std::path::Path>, e: std::io::Error) -> Self {
        SyncError::Io {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        }
    }

    pub fn code(&self) -> CanonicalErrorCode {
        match self {
            SyncError::AccessDenied { .. } => CanonicalErrorCode::PermissionDenied,
            SyncError::DeviceUnreachable { .. } => CanonicalErrorCode::Unavailable,
            SyncError::RemoteActionFailed { .. } => CanonicalErrorCode::Aborted,
            SyncError::NoChanges => CanonicalErrorCode::InvalidArgument,
            SyncError::ParseDegraded { .. } => CanonicalErrorCode::DataLoss,
            SyncError::TelemetryTimeout { .. } => CanonicalErrorCode::DeadlineExceeded,
            SyncError::TelemetryMalformed { .. } => CanonicalErrorCode::DataLoss,
            SyncError::InvalidArgument(_) => CanonicalErrorCode::InvalidArgument,
            SyncError::NotFound(_) => CanonicalErrorCode::NotFound,
            SyncError::Io { .. } => CanonicalErrorCode::Internal,
        }
    }
}

impl From<SyncError> for CanonicalError {
    fn from(e: SyncError) -> Self {
        let message = e.to_string();
        let message = message.as_str();
        match e.code() {
            CanonicalErrorCode::PermissionDenied => permission_denied_error(message),
            CanonicalErrorCode::Unavailable => unavailable_error(message),
            CanonicalErrorCode::Aborted => aborted_error(message),
            CanonicalErrorCode::InvalidArgument => invalid_argument_error(message),
            CanonicalErrorCode::DataLoss => data_loss_error(message),
            CanonicalErrorCode::DeadlineExceeded => deadline_exceeded_error(message),
            CanonicalErrorCode::NotFound => not_found_error(message),
            _ => internal_error(message),
        }
    }
}
