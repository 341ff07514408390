// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

pub mod action_runner_trait;
pub mod camera_fields;
pub mod device_state;
pub mod ini_format;
pub mod liveness_trait;
pub mod remote_formats;
pub mod sync_error;
pub mod telemetry_record;
