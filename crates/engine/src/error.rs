//! Error types for wizard transitions and backend bridges.

use std::time::Duration;

use qeapp_api::ApiError;
use qeapp_util::status_error_message;
use serde::Serialize;
use thiserror::Error;

use crate::gate::StepStatus;

/// Rejected wizard commands. The wizard state is unchanged when one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("step {index} does not exist (wizard has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error("step {step} has no tab titled '{tab}'")]
    TabNotFound { step: usize, tab: String },

    #[error("cannot {action} step {step} while it is {status}")]
    InvalidTransition {
        step: usize,
        action: &'static str,
        status: StepStatus,
    },

    #[error("step {step} is {status} and cannot be edited")]
    StepNotEditable { step: usize, status: StepStatus },

    #[error("snapshot does not match the wizard layout: {reason}")]
    SnapshotMismatch { reason: String },
}

impl WizardError {
    pub fn snapshot_mismatch(reason: impl Into<String>) -> Self {
        Self::SnapshotMismatch { reason: reason.into() }
    }
}

/// Failures of a backend fetch, converted to tab-local state.
///
/// A missing job id or structure is not an error: the bridge simply stays idle.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum BridgeError {
    /// Network failure, non-success status, or timeout.
    #[error("{message}")]
    BackendUnavailable { message: String },

    /// The backend answered with a shape the engine cannot use.
    #[error("malformed backend response: {message}")]
    MalformedResponse { message: String },
}

impl BridgeError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable { message: message.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse { message: message.into() }
    }

    pub fn timed_out(operation: &str, timeout: Duration) -> Self {
        Self::unavailable(format!("{operation} timed out after {}ms", timeout.as_millis()))
    }
}

impl From<ApiError> for BridgeError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Decode(source) => Self::malformed(source.to_string()),
            ApiError::Status { status, body } => {
                let message = status_error_message(status).unwrap_or_else(|| format!("HTTP {status}: {body}"));
                Self::unavailable(message)
            }
            other => Self::unavailable(other.to_string()),
        }
    }
}
