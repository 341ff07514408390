// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};

use gs_elements::sync_error::SyncError;
use gs_elements::telemetry_record::{AntennaStats, TelemetryRecord};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RssiReport {
    pub id: Option<String>,
    pub best_rssi: Option<i64>,
    pub antennas: Vec<AntennaStats>,
}

impl From<TelemetryRecord> for RssiReport {
    fn from(record: TelemetryRecord) -> Self {
        RssiReport{
            id: record.id.clone(),
            best_rssi: record.best_rssi(),
            antennas: record.rx_ant_stats,
        }
    }
}

// Polls the link statistics stream for one receive record.
pub struct TelemetryReader {
    addr: String,
    window: Duration,
}

impl TelemetryReader {
    pub fn new(addr: &str, window: Duration) -> Self {
        TelemetryReader{addr: addr.to_string(), window}
    }

    // Connects and reads lines until an rx record arrives or `window` has
    // elapsed. The connection is closed on return either way.
    pub async fn read_record(&self) -> Result<TelemetryRecord, SyncError> {
        let deadline = Instant::now() + self.window;
        let window_ms = self.window.as_millis() as u64;

        let stream = match timeout_at(deadline, TcpStream::connect(&self.addr)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                warn!("Could not connect to telemetry at {}: {:?}", self.addr, e);
                return Err(SyncError::TelemetryTimeout{window_ms});
            },
            Err(_) => return Err(SyncError::TelemetryTimeout{window_ms}),
        };
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut lines_seen = 0;
        let mut last_rejected: Option<String> = None;
        loop {
            buf.clear();
            match timeout_at(deadline, reader.read_until(b'\n', &mut buf)).await {
                // Stream closed.
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => {
                    // Invalid UTF-8 becomes an unparseable line rather than a
                    // read error.
                    let line = String::from_utf8_lossy(&buf);
                    if line.trim().is_empty() {
                        continue;
                    }
                    lines_seen += 1;
                    match TelemetryRecord::parse_line(&line) {
                        Some(record) if record.is_rx_record() => return Ok(record),
                        Some(record) => {
                            debug!("Skipping telemetry record of type {:?}",
                                   record.record_type);
                            last_rejected = Some(
                                format!("record type {:?} without antenna stats",
                                        record.record_type));
                        },
                        None => {
                            last_rejected = Some(
                                format!("unparseable line {:?}", line.trim_end()));
                        }
                    }
                },
                Ok(Err(e)) => {
                    warn!("Error reading telemetry: {:?}", e);
                    break;
                },
                Err(_) => break,
            }
        }
        match last_rejected {
            Some(reason) if lines_seen > 0 => {
                Err(SyncError::TelemetryMalformed{
                    reason: format!("{} line(s) received, last: {}", lines_seen, reason)})
            },
            _ => Err(SyncError::TelemetryTimeout{window_ms}),
        }
    }

    pub async fn read_rssi(&self) -> Result<RssiReport, SyncError> {
        Ok(self.read_record().await?.into())
    }
}
