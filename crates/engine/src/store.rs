//! Step data storage.
//!
//! [`StepDataStore`] owns the ordered steps together with every tab payload and
//! the confirmation flags. It performs no gating of its own: the wizard checks
//! [`crate::gate`] before forwarding writes. Writes never mutate a payload in
//! place; each update stores a freshly built map.

use qeapp_types::{Step, TabData};
use serde_json::Value;

use crate::error::WizardError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepDataStore {
    steps: Vec<Step>,
}

impl StepDataStore {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Result<&Step, WizardError> {
        self.steps.get(index).ok_or(WizardError::StepOutOfRange {
            index,
            len: self.steps.len(),
        })
    }

    pub(crate) fn step_mut(&mut self, index: usize) -> Result<&mut Step, WizardError> {
        let len = self.steps.len();
        self.steps.get_mut(index).ok_or(WizardError::StepOutOfRange { index, len })
    }

    /// Stored payload of a tab. Absent until the tab first writes.
    pub fn tab_data(&self, step: usize, tab: &str) -> Option<&TabData> {
        self.steps.get(step).and_then(|step| step.tab_data(tab))
    }

    /// Single field of a tab payload, used for cross-step reads.
    pub fn field(&self, step: usize, tab: &str, field: &str) -> Option<&Value> {
        self.tab_data(step, tab).and_then(|data| data.get(field))
    }

    /// Replaces a tab payload. Returns `false` when the payload was already equal.
    pub(crate) fn replace_tab_data(&mut self, step: usize, tab: &str, data: TabData) -> Result<bool, WizardError> {
        let target = self.step_mut(step)?;
        if target.tab(tab).is_none() {
            return Err(WizardError::TabNotFound {
                step,
                tab: tab.to_string(),
            });
        }
        if target.data.get(tab) == Some(&data) {
            return Ok(false);
        }
        target.data.insert(tab.to_string(), data);
        Ok(true)
    }

    /// Shallow-merges `patch` over the stored payload and stores the result.
    pub(crate) fn patch_tab_data(&mut self, step: usize, tab: &str, patch: TabData) -> Result<bool, WizardError> {
        let mut merged = self.tab_data(step, tab).cloned().unwrap_or_default();
        merged.extend(patch);
        self.replace_tab_data(step, tab, merged)
    }
}
