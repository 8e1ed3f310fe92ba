//! Persistence boundary for wizard state.
//!
//! Without a snapshot, wizard state lives only as long as the process. A
//! [`WizardSnapshot`] captures every step's payloads and flags so a session can
//! be saved to disk and resumed, or reloaded from the `stepsData` a job
//! stored at submission.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use qeapp_types::{JobData, Step, TabData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Format version written into new snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("job steps data is not a list of steps: {0}")]
    InvalidStepsData(#[source] serde_json::Error),
}

/// Saved state of one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepSnapshot {
    pub title: String,
    #[serde(default)]
    pub data: IndexMap<String, TabData>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub modified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub active_step: usize,
    pub steps: Vec<StepSnapshot>,
}

impl WizardSnapshot {
    pub fn capture(steps: &[Step], active_step: usize) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            active_step,
            steps: steps
                .iter()
                .map(|step| StepSnapshot {
                    title: step.title.clone(),
                    data: step.data.clone(),
                    confirmed: step.confirmed,
                    modified: step.modified,
                })
                .collect(),
        }
    }

    /// Writes the snapshot as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let io_error = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_error)?;
        debug!(path = %path.display(), steps = self.steps.len(), "saved wizard snapshot");
        Ok(())
    }

    /// Reads a snapshot. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let snapshot: Self = serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion { found: snapshot.version });
        }
        Ok(Some(snapshot))
    }

    /// Builds a snapshot from the `stepsData` a job saved at submission.
    /// Returns `None` when the job carries no steps data.
    pub fn from_job_data(job: &JobData) -> Result<Option<Self>, SnapshotError> {
        let Some(steps_data) = job.steps_data.as_ref().filter(|value| !value.is_null()) else {
            return Ok(None);
        };
        let steps: Vec<StepSnapshot> =
            serde_json::from_value(steps_data.clone()).map_err(SnapshotError::InvalidStepsData)?;

        // A submitted job resumes on its last step.
        let active_step = steps.len().saturating_sub(1);
        Ok(Some(Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            active_step,
            steps,
        }))
    }

    /// Serialises only the steps, in the shape stored as a job's `stepsData`.
    pub fn steps_data(&self) -> Value {
        serde_json::to_value(&self.steps).unwrap_or(Value::Null)
    }
}
