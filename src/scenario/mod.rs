//! Scenario payloads and shape normalization.
//!
//! A scenario is an open key/value record: the pipeline only relies on a
//! small set of well-known keys (`title`, `category`, `background`) and
//! treats everything else as opaque content. The Clerk applies
//! `coerce_shape` once at the formatting boundary so every record that
//! enters the candidate pool has the expected field types; no later stage
//! may assume hidden keys exist.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields expected to be lists. Strings, JSON-encoded strings, and bare
/// scalars are coerced to single-element lists at the Clerk boundary.
pub const LIST_FIELDS: &[&str] = &[
    "steps",
    "required_response",
    "debrief_points",
    "comms",
    "decision_points",
    "escalation_conditions",
    "lessons_learned",
    "variations",
    "validation",
];

/// Scalar fields filled with an empty-string default when missing.
pub const TEXT_FIELDS: &[&str] = &[
    "external_id",
    "title",
    "category",
    "threat_level",
    "likelihood",
    "complexity",
    "location",
    "background",
    "operational_background",
    "end_state_success",
    "end_state_failure",
];

/// One scenario record as an open key/value map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScenarioData(pub Map<String, Value>);

impl ScenarioData {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from any JSON object value. Non-objects yield an
    /// empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    /// Raw access to the underlying map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String view of a field; non-strings and missing keys read as "".
    pub fn get_str(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Scenario title.
    pub fn title(&self) -> &str {
        self.get_str("title")
    }

    /// Scenario category.
    pub fn category(&self) -> &str {
        self.get_str("category")
    }

    /// Scenario background narrative.
    pub fn background(&self) -> &str {
        self.get_str("background")
    }

    /// Number of response steps.
    pub fn step_count(&self) -> usize {
        self.0
            .get("steps")
            .and_then(Value::as_array)
            .map(|a| a.len())
            .unwrap_or(0)
    }

    /// The text used for semantic dedup: title and background.
    pub fn dedup_text(&self) -> String {
        format!("{}\n{}", self.title(), self.background())
            .trim()
            .to_string()
    }

    /// Normalize the record to the expected shape.
    ///
    /// - Known scalar fields missing from the record default to `""`.
    /// - Known list fields are coerced to lists: JSON-encoded strings are
    ///   parsed, scalars are wrapped, `null` and empty strings become `[]`.
    /// - Unknown keys pass through untouched.
    pub fn coerce_shape(&mut self) {
        for key in TEXT_FIELDS {
            self.0
                .entry(key.to_string())
                .or_insert_with(|| Value::String(String::new()));
        }
        for key in LIST_FIELDS {
            let coerced = coerce_list(self.0.get(*key));
            self.0.insert(key.to_string(), Value::Array(coerced));
        }
    }

    /// Consume into the underlying JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Coerce a single field value into a list.
fn coerce_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => items,
                Ok(other) => vec![other],
                Err(_) => vec![Value::String(s.clone())],
            }
        }
        Some(other) => vec![other.clone()],
    }
}

/// The bundle view over one run's output: the approved scenarios that share
/// a `bundle_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Identifier shared by every scenario in the batch.
    pub bundle_id: String,
    /// Approved scenario records.
    pub scenarios: Vec<ScenarioData>,
}

impl Bundle {
    /// Number of scenarios in the bundle.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
