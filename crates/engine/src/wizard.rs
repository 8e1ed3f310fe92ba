//! Wizard orchestration.
//!
//! [`Wizard`] owns the step store, one [`TabRuntime`] per declared tab, and
//! the active-tab selection of every step. Reads go through the borrowed
//! [`WorkflowView`]; every write is a [`WizardCommand`] passed to
//! [`Wizard::apply`], which checks the step gate first and leaves the wizard
//! untouched when it rejects the command.

use std::sync::Arc;
use std::time::Duration;

use qeapp_types::{Step, TabData, TabSpec, WizardLayout};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::backend::QeBackend;
use crate::context::{SharedContext, enabled_properties};
use crate::error::WizardError;
use crate::gate::{self, StepStatus};
use crate::resources::{CodeField, set_code_field};
use crate::snapshot::WizardSnapshot;
use crate::store::StepDataStore;
use crate::tabs::{TabRuntime, TabView, xps};
use crate::visibility::{NO_TABS_PLACEHOLDER, TabSelection, visible_indices};

/// Label of the confirm action when a step does not set one.
pub const DEFAULT_BUTTON_TEXT: &str = "Confirm";

/// Writes accepted by [`Wizard::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WizardCommand {
    /// Replaces a tab payload.
    UpdateTabData { step: usize, tab: String, data: TabData },
    /// Shallow-merges fields into a tab payload.
    PatchTabData { step: usize, tab: String, patch: TabData },
    /// Sets one resource field of a code. Counts are coerced to a positive
    /// integer before they are stored.
    SetCodeField {
        step: usize,
        tab: String,
        code: String,
        field: CodeField,
        value: Value,
    },
    /// Toggles one XPS core level.
    SetCoreLevel {
        step: usize,
        tab: String,
        level: String,
        enabled: bool,
    },
    ConfirmStep { step: usize },
    ModifyStep { step: usize },
    /// Expands a step.
    SelectStep { step: usize },
    /// Activates a visible tab of a step.
    SelectTab { step: usize, tab: String },
}

/// Rendered tab entry of a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabEntry {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub active: bool,
    /// Content, absent while the step is locked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<TabView>,
}

/// Rendered step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub index: usize,
    /// One-based number shown to the user.
    pub number: usize,
    pub title: String,
    pub button_text: String,
    pub status: StepStatus,
    pub confirmed: bool,
    pub modified: bool,
    pub expanded: bool,
    pub tabs: Vec<TabEntry>,
    pub active_tab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardView {
    pub active_step: usize,
    pub steps: Vec<StepView>,
}

/// Read-only handle on the wizard state.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowView<'a> {
    store: &'a StepDataStore,
    active_step: usize,
}

impl<'a> WorkflowView<'a> {
    pub fn steps(&self) -> &'a [Step] {
        self.store.steps()
    }

    pub fn active_step(&self) -> usize {
        self.active_step
    }

    pub fn status(&self, step: usize) -> Result<StepStatus, WizardError> {
        gate::status(self.store, step)
    }

    pub fn tab_data(&self, step: usize, tab: &str) -> Option<&'a TabData> {
        self.store.tab_data(step, tab)
    }

    pub fn context(&self) -> SharedContext {
        SharedContext::from_store(self.store)
    }

    /// Titles of the tabs of `step` visible under the current properties.
    pub fn visible_tabs(&self, step: usize) -> Result<Vec<&'a str>, WizardError> {
        let tabs = &self.store.step(step)?.tabs;
        let properties = enabled_properties(self.store);
        Ok(visible_indices(tabs, &properties)
            .into_iter()
            .map(|index| tabs[index].title.as_str())
            .collect())
    }
}

pub struct Wizard {
    store: StepDataStore,
    runtimes: Vec<Vec<TabRuntime>>,
    selections: Vec<TabSelection>,
    active_step: usize,
}

impl Wizard {
    pub fn new(layout: WizardLayout, backend: Arc<dyn QeBackend>, timeout: Duration) -> Self {
        let runtimes = layout
            .steps
            .iter()
            .map(|step| {
                step.tabs
                    .iter()
                    .map(|tab| TabRuntime::for_tab(tab, &backend, timeout))
                    .collect()
            })
            .collect();
        let selections = vec![TabSelection::default(); layout.steps.len()];

        let mut wizard = Self {
            store: StepDataStore::new(layout.steps),
            runtimes,
            selections,
            active_step: 0,
        };
        for step in 0..wizard.store.len() {
            wizard.refresh_visibility(step);
        }
        wizard
    }

    pub fn view(&self) -> WorkflowView<'_> {
        WorkflowView {
            store: &self.store,
            active_step: self.active_step,
        }
    }

    pub fn active_step(&self) -> usize {
        self.active_step
    }

    /// Applies a write. On error nothing changes.
    pub fn apply(&mut self, command: WizardCommand) -> Result<(), WizardError> {
        match command {
            WizardCommand::UpdateTabData { step, tab, data } => {
                gate::ensure_editable(&self.store, step)?;
                if self.store.replace_tab_data(step, &tab, data)? {
                    debug!(step, tab = %tab, "tab data replaced");
                    self.refresh_all_visibility();
                }
            }
            WizardCommand::PatchTabData { step, tab, patch } => {
                gate::ensure_editable(&self.store, step)?;
                if self.store.patch_tab_data(step, &tab, patch)? {
                    debug!(step, tab = %tab, "tab data patched");
                    self.refresh_all_visibility();
                }
            }
            WizardCommand::SetCodeField {
                step,
                tab,
                code,
                field,
                value,
            } => {
                gate::ensure_editable(&self.store, step)?;
                let current = self.store.tab_data(step, &tab).cloned().unwrap_or_default();
                let next = set_code_field(&current, &code, field, &value);
                if self.store.replace_tab_data(step, &tab, next)? {
                    debug!(step, tab = %tab, code = %code, field = field.key(), "code field set");
                }
            }
            WizardCommand::SetCoreLevel {
                step,
                tab,
                level,
                enabled,
            } => {
                gate::ensure_editable(&self.store, step)?;
                let current = self.store.tab_data(step, &tab).cloned().unwrap_or_default();
                let next = xps::set_core_level(&current, &level, enabled);
                if self.store.replace_tab_data(step, &tab, next)? {
                    debug!(step, tab = %tab, level = %level, enabled, "core level toggled");
                }
            }
            WizardCommand::ConfirmStep { step } => {
                gate::confirm(&mut self.store, step)?;
                self.active_step = (step + 1).min(self.store.len().saturating_sub(1));
            }
            WizardCommand::ModifyStep { step } => {
                gate::modify(&mut self.store, step)?;
                self.active_step = step;
            }
            WizardCommand::SelectStep { step } => {
                let status = gate::status(&self.store, step)?;
                if !status.is_interactable() {
                    return Err(WizardError::InvalidTransition {
                        step,
                        action: "open",
                        status,
                    });
                }
                self.active_step = step;
            }
            WizardCommand::SelectTab { step, tab } => {
                let status = gate::status(&self.store, step)?;
                if !status.is_interactable() {
                    return Err(WizardError::InvalidTransition {
                        step,
                        action: "select a tab of",
                        status,
                    });
                }
                self.refresh_visibility(step);
                if !self.selections[step].select(&tab) {
                    return Err(WizardError::TabNotFound { step, tab });
                }
            }
        }
        Ok(())
    }

    /// Renders one step, publishing any payload its tabs seed or reconcile.
    /// Payloads are only published while the step is editable.
    pub fn render_step(&mut self, index: usize) -> Result<StepView, WizardError> {
        let status = gate::status(&self.store, index)?;
        let context = SharedContext::from_store(&self.store);
        let visible = self.refresh_visibility(index);

        let mut tabs = Vec::with_capacity(visible.len());
        for tab_index in visible {
            let spec: TabSpec = self.store.step(index)?.tabs[tab_index].clone();
            let active = self.selections[index].active() == Some(spec.title.as_str());

            let view = if status.is_interactable() {
                let data = self.store.tab_data(index, &spec.title).cloned().unwrap_or_default();
                let rendered = self.runtimes[index][tab_index].render(&spec, &data, &context);
                if let Some(updated) = rendered.updated
                    && status == StepStatus::Editable
                    && self.store.replace_tab_data(index, &spec.title, updated)?
                {
                    debug!(step = index, tab = %spec.title, "tab published seeded data");
                }
                Some(rendered.view)
            } else {
                None
            };

            tabs.push(TabEntry {
                title: spec.title,
                id: spec.id,
                active,
                view,
            });
        }

        let step = self.store.step(index)?;
        let active_tab = self.selections[index].active().map(str::to_string);
        Ok(StepView {
            index,
            number: index + 1,
            title: step.title.clone(),
            button_text: step
                .button_text
                .clone()
                .unwrap_or_else(|| DEFAULT_BUTTON_TEXT.to_string()),
            status,
            confirmed: step.confirmed,
            modified: step.modified,
            expanded: index == self.active_step,
            placeholder: tabs.is_empty().then_some(NO_TABS_PLACEHOLDER),
            tabs,
            active_tab,
        })
    }

    /// Renders every step in order.
    pub fn render(&mut self) -> Result<WizardView, WizardError> {
        let steps = (0..self.store.len())
            .map(|index| self.render_step(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WizardView {
            active_step: self.active_step,
            steps,
        })
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot::capture(self.store.steps(), self.active_step)
    }

    /// Replaces all step payloads and flags with those of `snapshot`.
    ///
    /// The snapshot must list the same steps, by title, as the layout.
    pub fn restore(&mut self, snapshot: &WizardSnapshot) -> Result<(), WizardError> {
        if snapshot.steps.len() != self.store.len() {
            return Err(WizardError::snapshot_mismatch(format!(
                "snapshot has {} steps, layout has {}",
                snapshot.steps.len(),
                self.store.len()
            )));
        }
        for (index, (saved, step)) in snapshot.steps.iter().zip(self.store.steps()).enumerate() {
            if saved.title != step.title {
                return Err(WizardError::snapshot_mismatch(format!(
                    "step {index} is '{}' in the snapshot but '{}' in the layout",
                    saved.title, step.title
                )));
            }
            if let Some(unknown) = saved.data.keys().find(|tab| step.tab(tab).is_none()) {
                return Err(WizardError::snapshot_mismatch(format!(
                    "step {index} has no tab titled '{unknown}'"
                )));
            }
        }

        self.teardown();
        for (index, saved) in snapshot.steps.iter().enumerate() {
            let step = self.store.step_mut(index)?;
            step.data = saved.data.clone();
            step.confirmed = saved.confirmed;
            step.modified = saved.modified;
        }
        self.active_step = snapshot.active_step.min(self.store.len().saturating_sub(1));
        self.refresh_all_visibility();
        info!(steps = snapshot.steps.len(), saved_at = %snapshot.saved_at, "wizard restored from snapshot");
        Ok(())
    }

    /// Cancels every outstanding fetch.
    pub fn teardown(&mut self) {
        for runtime in self.runtimes.iter_mut().flatten() {
            runtime.teardown();
        }
    }

    fn refresh_all_visibility(&mut self) {
        for step in 0..self.store.len() {
            self.refresh_visibility(step);
        }
    }

    /// Re-validates the active tab of `step` and tears down hidden tabs.
    /// Returns the visible tab indices.
    fn refresh_visibility(&mut self, step: usize) -> Vec<usize> {
        let properties = enabled_properties(&self.store);
        let Some(tabs) = self.store.steps().get(step).map(|step| &step.tabs) else {
            return Vec::new();
        };
        let visible = visible_indices(tabs, &properties);
        let titles: Vec<&str> = visible.iter().map(|&index| tabs[index].title.as_str()).collect();

        if self.selections[step].revalidate(&titles) {
            debug!(step, active = ?self.selections[step].active(), "active tab changed");
        }
        for (index, runtime) in self.runtimes[step].iter_mut().enumerate() {
            if !visible.contains(&index) {
                runtime.teardown();
            }
        }
        visible
    }
}

impl Drop for Wizard {
    fn drop(&mut self) {
        self.teardown();
    }
}
