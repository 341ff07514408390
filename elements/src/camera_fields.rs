// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

// Which of the camera's two configuration subsystems reports a field's current
// value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigSource {
    // Flat `key=value` text from the radio link (wfb) config.
    Flat,
    // Structured YAML document from the video encoder (majestic) config; the
    // value lives under the `video0` section.
    Structured,
}

impl ConfigSource {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigSource::Flat => "wfb",
            ConfigSource::Structured => "majestic",
        }
    }
}

// One independently updatable camera setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigField {
    // Canonical name, as used by clients.
    pub name: &'static str,
    // Environment variable carrying a new value to `update_action`.
    pub remote_env_var: &'static str,
    // Function in the commands script that applies a new value.
    pub update_action: &'static str,
    // Value reported when the device does not supply one.
    pub default_value: &'static str,
    pub source: ConfigSource,
    // Key of this field within `source`.
    pub source_key: &'static str,
}

const fn field(name: &'static str,
               remote_env_var: &'static str,
               update_action: &'static str,
               default_value: &'static str,
               source: ConfigSource,
               source_key: &'static str) -> ConfigField {
    ConfigField{name, remote_env_var, update_action, default_value,
                source, source_key}
}

pub static CAMERA_FIELDS: [ConfigField; 10] = [
    field("fps", "FPS", "update_fps", "60",
          ConfigSource::Structured, "fps"),
    field("size", "SIZE", "update_size", "1920x1080",
          ConfigSource::Structured, "size"),
    field("bitrate", "BITRATE", "update_bitrate", "4096",
          ConfigSource::Structured, "bitrate"),
    field("channel", "CHANNEL", "update_channel", "161",
          ConfigSource::Flat, "channel"),
    field("txpower_override", "TXPOWER_OVERRIDE", "update_txpower_override", "1",
          ConfigSource::Flat, "driver_txpower_override"),
    field("stbc", "STBC", "update_stbc", "0",
          ConfigSource::Flat, "stbc"),
    field("ldpc", "LDPC", "update_ldpc", "0",
          ConfigSource::Flat, "ldpc"),
    field("mcs_index", "MCS_INDEX", "update_mcs_index", "1",
          ConfigSource::Flat, "mcs_index"),
    field("fec_k", "FEC_K", "update_fec_k", "8",
          ConfigSource::Flat, "fec_k"),
    field("fec_n", "FEC_N", "update_fec_n", "12",
          ConfigSource::Flat, "fec_n"),
];

pub fn lookup_field(name: &str) -> Option<&'static ConfigField> {
    CAMERA_FIELDS.iter().find(|f| f.name == name)
}
