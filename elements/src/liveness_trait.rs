// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait LivenessProbeTrait {
    /// Sends a single liveness probe to `host`. Returns true only if a reply
    /// arrived within `timeout`. Probe failures of any kind yield false.
    async fn probe(&self, host: &str, timeout: Duration) -> bool;
}
