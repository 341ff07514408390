// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

pub mod camera_sync;
pub mod config_store;
pub mod field_dispatcher;
pub mod gs_server;
pub mod key_store;
pub mod media_library;
pub mod reachability;
pub mod remote_reader;
pub mod shell_actions;
pub mod telemetry_reader;
