//! Read-only upstream values injected into every tab render.
//!
//! Later steps never copy upstream data into their own payloads; they read it
//! from the store at render time through [`SharedContext`].

use serde::Serialize;
use serde_json::{Map as JsonMap, Value};

use crate::layout::{SETTINGS_STEP, SETTINGS_TAB, STATUS_STEP, STATUS_TAB, STRUCTURE_STEP, STRUCTURE_TAB, SUBMIT_STEP, SUBMIT_TAB};
use crate::store::StepDataStore;
use crate::visibility::is_truthy;

/// Protocol assumed until the settings tab stores one.
pub const DEFAULT_PROTOCOL: &str = "moderate";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedContext {
    pub protocol: String,
    /// Structure selected in the first step.
    pub structure: Option<Value>,
    /// Identifier of the submitted job.
    pub job_id: Option<String>,
    pub job_status: Option<String>,
    /// Property toggles that gate tab visibility.
    pub properties: JsonMap<String, Value>,
}

impl Default for SharedContext {
    fn default() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            structure: None,
            job_id: None,
            job_status: None,
            properties: JsonMap::new(),
        }
    }
}

impl SharedContext {
    pub fn from_store(store: &StepDataStore) -> Self {
        let protocol = store
            .field(SETTINGS_STEP, SETTINGS_TAB, "protocol")
            .and_then(Value::as_str)
            .filter(|protocol| !protocol.is_empty())
            .unwrap_or(DEFAULT_PROTOCOL)
            .to_string();

        let structure = store
            .field(STRUCTURE_STEP, STRUCTURE_TAB, "selectedStructure")
            .filter(|value| is_truthy(value))
            .cloned();

        Self {
            protocol,
            structure,
            job_id: store.field(SUBMIT_STEP, SUBMIT_TAB, "jobId").and_then(scalar_text),
            job_status: store.field(STATUS_STEP, STATUS_TAB, "jobStatus").and_then(scalar_text),
            properties: enabled_properties(store),
        }
    }
}

/// The settings tab's `properties` map, or an empty map.
pub fn enabled_properties(store: &StepDataStore) -> JsonMap<String, Value> {
    store
        .field(SETTINGS_STEP, SETTINGS_TAB, "properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Renders a truthy string or number as text. Job ids arrive as either.
fn scalar_text(value: &Value) -> Option<String> {
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
