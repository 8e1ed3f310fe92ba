//! Wizard layout definitions.
//!
//! A wizard is an ordered list of [`Step`]s. Each step declares its tabs up
//! front and carries a per-tab JSON payload keyed by tab title. Authoring order
//! is preserved (via `IndexMap`) so steps and tabs render in a predictable
//! sequence.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

use crate::codes::CodeConfig;

/// Payload owned by a single tab within a single step.
pub type TabData = JsonMap<String, Value>;

/// Complete wizard definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WizardLayout {
    /// Steps in dependency order.
    pub steps: Vec<Step>,
}

/// One stage of the wizard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Heading shown for the step.
    pub title: String,
    /// Label of the confirm action, when the default is not wanted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    /// Declared tabs, in display order.
    pub tabs: Vec<TabSpec>,
    /// Tab payloads keyed by tab title.
    #[serde(default)]
    pub data: IndexMap<String, TabData>,
    /// Set once the user confirms the step.
    #[serde(default)]
    pub confirmed: bool,
    /// Set once a confirmed step has been reopened.
    #[serde(default)]
    pub modified: bool,
}

impl Step {
    /// Creates an unconfirmed step with no data.
    pub fn new(title: impl Into<String>, tabs: Vec<TabSpec>) -> Self {
        Self {
            title: title.into(),
            button_text: None,
            tabs,
            data: IndexMap::new(),
            confirmed: false,
            modified: false,
        }
    }

    /// Returns the declared tab with the given title.
    pub fn tab(&self, title: &str) -> Option<&TabSpec> {
        self.tabs.iter().find(|tab| tab.title == title)
    }

    /// Returns the stored payload of a tab, if any was written.
    pub fn tab_data(&self, title: &str) -> Option<&TabData> {
        self.data.get(title)
    }
}

/// Declaration of a tab inside a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabSpec {
    /// Title, unique within the step. Doubles as the data key.
    pub title: String,
    /// Property identifier matched against the enabled-properties map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Content variant rendered for the tab.
    #[serde(flatten)]
    pub kind: TabKind,
}

impl TabSpec {
    pub fn new(title: impl Into<String>, kind: TabKind) -> Self {
        Self {
            title: title.into(),
            id: None,
            kind,
        }
    }

    /// Attaches a property identifier that gates the tab's visibility.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Content variants a tab may render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TabKind {
    /// Structure picker; stores `selectedStructure`.
    StructureSelection,
    /// Protocol and property toggles; stores `protocol` and `properties`.
    WorkflowSettings,
    /// Per-code resource selection seeded from declared defaults.
    CodeResources {
        #[serde(default)]
        codes: IndexMap<String, CodeConfig>,
    },
    /// XPS core-level settings backed by a support lookup.
    Xps,
    /// Job label and submission; stores `jobId`.
    Submit,
    /// Status of the submitted job.
    JobStatus,
    /// Relaxed structure fetched for the submitted job.
    FinalStructure,
    /// Plain form whose payload is edited directly.
    Form,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_kinds_from_yaml() {
        let yaml = r#"
title: Computational resources
tabs:
  - title: Global resources
    kind: code_resources
    codes:
      pw:
        label: qe-7.2-pw@localhost
        nodes: 1
        cpus: "2"
        codeOptions: [qe-7.2-pw@localhost]
  - title: Bands Resource Settings
    id: bands
    kind: form
"#;
        let step: Step = serde_yaml::from_str(yaml).expect("parse step");
        assert_eq!(step.tabs.len(), 2);
        assert!(!step.confirmed);
        match &step.tabs[0].kind {
            TabKind::CodeResources { codes } => {
                assert_eq!(codes["pw"].cpus, 2);
                assert_eq!(codes["pw"].code_options, vec!["qe-7.2-pw@localhost".to_string()]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(step.tabs[1].id.as_deref(), Some("bands"));
        assert_eq!(step.tabs[1].kind, TabKind::Form);
    }
}
