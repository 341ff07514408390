// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use serde::{Deserialize, Serialize};

// Value of the `type` field identifying a receive-statistics record.
pub const RX_RECORD_TYPE: &str = "rx";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct AntennaStats {
    pub ant: Option<i64>,
    pub freq: Option<i64>,
    pub mcs: Option<i64>,
    pub bw: Option<i64>,
    pub pkt_recv: Option<i64>,
    pub rssi_min: Option<i64>,
    pub rssi_avg: Option<i64>,
    pub rssi_max: Option<i64>,
    pub snr_min: Option<i64>,
    pub snr_avg: Option<i64>,
    pub snr_max: Option<i64>,
}

// One newline-delimited JSON record from the link statistics stream. Only the
// fields we report on are modeled; others are ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TelemetryRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub rx_ant_stats: Vec<AntennaStats>,
}

impl TelemetryRecord {
    // Parses one line. Returns None for lines that are not JSON objects of
    // the expected shape.
    pub fn parse_line(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }

    pub fn is_rx_record(&self) -> bool {
        self.record_type == RX_RECORD_TYPE && !self.rx_ant_stats.is_empty()
    }

    // Highest average RSSI over all antennas that report one.
    pub fn best_rssi(&self) -> Option<i64> {
        self.rx_ant_stats.iter().filter_map(|a| a.rssi_avg).max()
    }
}
