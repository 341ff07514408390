// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

// Parsers for the two configuration formats reported by the camera.

use std::collections::BTreeMap;

use log::debug;
use serde_yaml::Value;

// Parses flat `key=value` text. Blank lines, `#` comments and lines without
// '=' are skipped. Keys and values are trimmed; a repeated key takes its last
// value.
pub fn parse_flat_config(text: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            result.insert(key.to_string(), value.trim().to_string());
        } else {
            debug!("Skipping flat config line {:?}", line);
        }
    }
    result
}

// Parses a YAML document and returns the scalar entries of its top-level
// `section` mapping, stringified. `banner`, if present in `text`, is removed
// before parsing (the camera's read command prints it ahead of the document).
// Errors describe why nothing could be extracted.
pub fn parse_structured_section(text: &str, banner: &str, section: &str)
                                -> Result<BTreeMap<String, String>, String> {
    let cleaned = if banner.is_empty() {
        text.to_string()
    } else {
        text.replace(banner, "")
    };
    let document: Value = serde_yaml::from_str(cleaned.trim())
        .map_err(|e| format!("YAML parsing error: {}", e))?;
    let sub_section = match document.get(section) {
        Some(Value::Mapping(m)) => m,
        Some(_) => {
            return Err(format!("section '{}' is not a mapping", section));
        },
        None => {
            return Err(format!("section '{}' not present", section));
        }
    };
    let mut result = BTreeMap::new();
    for (key, value) in sub_section {
        let key = match scalar_string(key) {
            Some(k) => k,
            None => continue,
        };
        if let Some(v) = scalar_string(value) {
            result.insert(key, v);
        } else {
            debug!("Skipping non-scalar entry {:?} in section '{}'", key, section);
        }
    }
    Ok(result)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_config() {
        let text = "# wfb settings\n\
                    channel=161\n\
                    \n\
                    mcs_index = 2\n\
                    garbage line\n\
                    =orphan\n\
                    key_with_eq=a=b\n\
                    channel= 149 \n";
        let parsed = parse_flat_config(text);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["channel"], "149");
        assert_eq!(parsed["mcs_index"], "2");
        assert_eq!(parsed["key_with_eq"], "a=b");
    }

    #[test]
    fn test_parse_flat_config_empty() {
        assert!(parse_flat_config("").is_empty());
        assert!(parse_flat_config("#only=comment\n\n").is_empty());
    }

    #[test]
    fn test_parse_structured_section() {
        let text = "Reading majestic configuration\n\
                    system:\n  logLevel: info\n\
                    video0:\n  enabled: true\n  fps: 90\n  size: 1280x720\n  \
                    bitrate: 8192\n  codec: h265\n  roi: [1, 2]\n";
        let parsed = parse_structured_section(
            text, "Reading majestic configuration", "video0").unwrap();
        assert_eq!(parsed["fps"], "90");
        assert_eq!(parsed["size"], "1280x720");
        assert_eq!(parsed["bitrate"], "8192");
        assert_eq!(parsed["enabled"], "true");
        assert!(!parsed.contains_key("roi"));
        assert!(!parsed.contains_key("logLevel"));
    }

    #[test]
    fn test_parse_structured_section_degraded() {
        assert!(parse_structured_section("", "", "video0").is_err());
        assert!(parse_structured_section("system:\n  a: 1\n", "", "video0").is_err());
        assert!(parse_structured_section("video0: 5\n", "", "video0").is_err());
        assert!(parse_structured_section("video0: [unclosed\n", "", "video0").is_err());
    }
}
