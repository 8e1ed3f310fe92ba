//! Step gating.
//!
//! Step *i* is interactable only while step *i − 1* is confirmed; step 0 is
//! always interactable. Status is recomputed from the confirmation flags on
//! every read, so confirming a step unlocks the next one without any extra
//! bookkeeping.
//!
//! Reopening a step with [`modify`] leaves every later step untouched: their
//! data and confirmation flags stay as they were until the user revisits them.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::error::WizardError;
use crate::store::StepDataStore;

/// Interaction state of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The previous step is not confirmed.
    Locked,
    /// Open for edits.
    Editable,
    /// Confirmed and closed for edits; the next step is unlocked.
    Confirmed,
}

impl StepStatus {
    pub fn is_interactable(self) -> bool {
        !matches!(self, StepStatus::Locked)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepStatus::Locked => "locked",
            StepStatus::Editable => "editable",
            StepStatus::Confirmed => "confirmed",
        };
        f.write_str(label)
    }
}

pub fn status(store: &StepDataStore, index: usize) -> Result<StepStatus, WizardError> {
    let step = store.step(index)?;
    if index > 0 && !store.step(index - 1)?.confirmed {
        return Ok(StepStatus::Locked);
    }
    Ok(if step.confirmed {
        StepStatus::Confirmed
    } else {
        StepStatus::Editable
    })
}

/// Confirms an editable step.
pub fn confirm(store: &mut StepDataStore, index: usize) -> Result<(), WizardError> {
    let current = status(store, index)?;
    if current != StepStatus::Editable {
        return Err(WizardError::InvalidTransition {
            step: index,
            action: "confirm",
            status: current,
        });
    }

    store.step_mut(index)?.confirmed = true;
    info!(step = index, "step confirmed");
    Ok(())
}

/// Reopens a confirmed step for editing.
pub fn modify(store: &mut StepDataStore, index: usize) -> Result<(), WizardError> {
    let current = status(store, index)?;
    if current != StepStatus::Confirmed {
        return Err(WizardError::InvalidTransition {
            step: index,
            action: "modify",
            status: current,
        });
    }

    let step = store.step_mut(index)?;
    step.confirmed = false;
    step.modified = true;
    info!(step = index, "step reopened for modification");
    Ok(())
}

/// Fails unless the step currently accepts data edits.
pub fn ensure_editable(store: &StepDataStore, index: usize) -> Result<(), WizardError> {
    match status(store, index)? {
        StepStatus::Editable => Ok(()),
        other => Err(WizardError::StepNotEditable { step: index, status: other }),
    }
}
