//! Payloads exchanged with the job, calculation, and code endpoints.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Response of `GET /jobs-data/{id}`.
///
/// The structure is kept as raw JSON so callers that only need the process
/// status are not affected by an unexpected structure shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobData {
    #[serde(default)]
    pub structure: Option<Value>,
    /// Wizard payload saved alongside the job at submission time.
    #[serde(rename = "stepsData", default)]
    pub steps_data: Option<Value>,
    /// Rendered process call graph.
    #[serde(rename = "processStatus", default)]
    pub process_status: Option<String>,
}

/// Response of `GET /jobs-data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobsPage {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

/// One row of the job history, keyed by the backend's projection names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: i64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub ctime: Option<String>,
    #[serde(rename = "extras.structure", default)]
    pub structure: Option<Value>,
    #[serde(rename = "attributes.process_state", default)]
    pub process_state: Option<String>,
    #[serde(rename = "extras.workchain.relax_type", default)]
    pub relax_type: Option<String>,
    #[serde(rename = "extras.workchain.properties", default)]
    pub properties: Option<Value>,
}

impl JobSummary {
    /// Creation time, when the backend sent an RFC 3339 timestamp.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.ctime
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    }
}

/// Response of `DELETE /jobs-data/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeleteJobOutcome {
    pub deleted: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub deleted_nodes: Vec<i64>,
}

/// Response of `POST /calculation/get_supported_xps_core_level/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct XpsSupport {
    #[serde(default)]
    pub supported_elements: Vec<String>,
    #[serde(default)]
    pub not_supported_elements: Vec<String>,
    #[serde(default)]
    pub correction_energies: Option<JsonMap<String, Value>>,
}

impl XpsSupport {
    pub fn correction_energies(&self) -> JsonMap<String, Value> {
        self.correction_energies.clone().unwrap_or_default()
    }
}

/// Entry of `GET /codes`. Opaque apart from its display label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CodeDescriptor(pub JsonMap<String, Value>);

impl CodeDescriptor {
    /// Prefers `full_label`, then `label`, then `name`.
    pub fn display_label(&self) -> Option<&str> {
        ["full_label", "label", "name"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }
}
