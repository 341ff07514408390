// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;
use serde_json::{Map, Value};

use crate::camera_fields::{CAMERA_FIELDS, lookup_field};
use crate::sync_error::SyncError;

// Current camera settings keyed by ConfigField name. A snapshot produced by
// the remote reader always has a value for every entry of CAMERA_FIELDS.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,

    // Sources that could not be fetched or parsed, whose fields fell back to
    // defaults.
    #[serde(skip)]
    pub degraded: Vec<SyncError>,
}

impl DeviceSnapshot {
    pub fn get(&self, field_name: &str) -> Option<&str> {
        self.values.get(field_name).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        CAMERA_FIELDS.iter().all(|f| self.values.contains_key(f.name))
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

// Caller-supplied new values, in submission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<(String, String)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet{entries: Vec::new()}
    }

    // A later insert of the same field replaces the value but keeps the
    // original position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    // Builds a ChangeSet from a JSON object, keeping the object's key order.
    // Non-string scalars are stringified. A camera field with a null or
    // nested value is rejected; keys that are not camera fields are kept
    // whatever their value, so the dispatcher can list them as ignored.
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, SyncError> {
        let mut change_set = ChangeSet::new();
        for (field, value) in object {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ if lookup_field(field).is_none() => value.to_string(),
                _ => {
                    return Err(SyncError::InvalidArgument(
                        format!("Unsupported value for '{}': {}", field, value)));
                }
            };
            change_set.insert(field.clone(), value);
        }
        Ok(change_set)
    }
}

impl<F: Into<String>, V: Into<String>> FromIterator<(F, V)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        let mut change_set = ChangeSet::new();
        for (f, v) in iter {
            change_set.insert(f, v);
        }
        change_set
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    Success,
    Failure(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateResult {
    pub field: String,
    pub outcome: UpdateOutcome,
}

// Rendered as {"field": .., "outcome": "success"} or
// {"field": .., "outcome": "failure", "reason": ..}.
impl Serialize for UpdateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = match self.outcome {
            UpdateOutcome::Success => 2,
            UpdateOutcome::Failure(_) => 3,
        };
        let mut state = serializer.serialize_struct("UpdateResult", len)?;
        state.serialize_field("field", &self.field)?;
        match &self.outcome {
            UpdateOutcome::Success => {
                state.serialize_field("outcome", "success")?;
            },
            UpdateOutcome::Failure(reason) => {
                state.serialize_field("outcome", "failure")?;
                state.serialize_field("reason", reason)?;
            }
        }
        state.end()
    }
}

// Outcome of applying a ChangeSet. Processing stops at the first failed
// field, so `results` holds the successes before it followed by at most one
// Failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub results: Vec<UpdateResult>,

    // Fields not in CAMERA_FIELDS; these were skipped.
    pub ignored: Vec<String>,

    // The error for the field that stopped processing, if any.
    #[serde(skip)]
    pub failure: Option<SyncError>,
}

impl DispatchReport {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&str> {
        self.results.iter()
            .filter(|r| r.outcome == UpdateOutcome::Success)
            .map(|r| r.field.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn test_change_set_order() {
        let mut cs = ChangeSet::new();
        cs.insert("fec_n", "12");
        cs.insert("channel", "149");
        cs.insert("fec_n", "10");
        let entries: Vec<(&str, &str)> = cs.iter().collect();
        assert_eq!(entries, vec![("fec_n", "10"), ("channel", "149")]);
    }

    #[test]
    fn test_change_set_from_json() {
        let body = json!({"mcs_index": 3, "size": "1280x720", "stbc": true});
        let cs = ChangeSet::from_json(body.as_object().unwrap()).unwrap();
        let entries: Vec<(&str, &str)> = cs.iter().collect();
        assert_eq!(entries, vec![("mcs_index", "3"),
                                 ("size", "1280x720"),
                                 ("stbc", "true")]);

        let body = json!({"channel": [1, 2]});
        assert!(matches!(ChangeSet::from_json(body.as_object().unwrap()),
                         Err(SyncError::InvalidArgument(_))));
        let body = json!({"fps": null});
        assert!(matches!(ChangeSet::from_json(body.as_object().unwrap()),
                         Err(SyncError::InvalidArgument(_))));
    }

    #[test]
    fn test_change_set_from_json_extra_keys() {
        let body = json!({"channel": 149, "ui_extra": null, "layout": {"tab": 2}});
        let cs = ChangeSet::from_json(body.as_object().unwrap()).unwrap();
        let entries: Vec<(&str, &str)> = cs.iter().collect();
        assert_eq!(entries, vec![("channel", "149"),
                                 ("ui_extra", "null"),
                                 ("layout", "{\"tab\":2}")]);
    }

    #[test]
    fn test_report_serialization() {
        let report = DispatchReport{
            results: vec![
                UpdateResult{field: "fps".to_string(),
                             outcome: UpdateOutcome::Success},
                UpdateResult{field: "size".to_string(),
                             outcome: UpdateOutcome::Failure("exit 1".to_string())},
            ],
            ignored: vec![],
            failure: Some(SyncError::NoChanges),
        };
        assert!(!report.success());
        assert_eq!(report.applied_fields(), vec!["fps"]);
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["results"][0], json!({"field": "fps", "outcome": "success"}));
        assert_eq!(v["results"][1],
                   json!({"field": "size", "outcome": "failure", "reason": "exit 1"}));
    }
}
