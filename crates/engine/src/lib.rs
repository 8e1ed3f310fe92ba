//! # QE App Wizard Engine
//!
//! The engine drives the step-gated wizard used to configure and submit
//! Quantum ESPRESSO jobs. A wizard is an ordered list of steps; each step owns
//! tabs and each tab owns a JSON payload. Later steps unlock only once the
//! previous step is confirmed, and what they show depends on upstream data
//! (selected structure, protocol, enabled properties, submitted job).
//!
//! ## Key Features
//!
//! - **Step gating**: `Locked`/`Editable`/`Confirmed` derived from confirmation flags
//! - **Tab visibility**: tabs filtered by the enabled-properties toggles
//! - **Code resources**: declared defaults merged with user overrides
//! - **Backend bridges**: cancellable fetches of job structure, status, XPS
//!   support, and the code catalogue
//! - **Snapshots**: save and restore wizard state
//!
//! ## Usage
//!
//! ```rust
//! use qeapp_engine::parse_layout_file;
//!
//! let temp_dir = tempfile::tempdir()?;
//! let layout_path = temp_dir.path().join("layout.yaml");
//! std::fs::write(&layout_path, r#"
//! steps:
//!   - title: Structure
//!     tabs:
//!       - title: Structure Selection
//!         kind: structure_selection
//! "#)?;
//!
//! let layout = parse_layout_file(&layout_path)?;
//! assert_eq!(layout.steps[0].tabs.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`store`**: step payloads and flags
//! - **`gate`**: step status and confirm/modify transitions
//! - **`visibility`**: tab filtering and active-tab selection
//! - **`resources`**: code default/override merging
//! - **`bridge`**: cancellable backend fetches
//! - **`tabs`**: per-kind tab rendering
//! - **`wizard`**: orchestration, commands, and views
//! - **`snapshot`**: persistence boundary

use std::{fs, path::Path};

use anyhow::{Context, Result};
use qeapp_types::{Step, WizardLayout};

pub mod backend;
pub mod bridge;
pub mod context;
pub mod error;
pub mod gate;
pub mod layout;
pub mod resources;
pub mod snapshot;
pub mod store;
pub mod tabs;
pub mod visibility;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use backend::QeBackend;
pub use bridge::{FetchState, RemoteResource};
pub use context::SharedContext;
pub use error::{BridgeError, WizardError};
pub use gate::StepStatus;
pub use layout::standard_layout;
pub use snapshot::{SnapshotError, WizardSnapshot};
pub use store::StepDataStore;
pub use tabs::{TabRender, TabRuntime, TabView};
pub use wizard::{StepView, TabEntry, Wizard, WizardCommand, WizardView, WorkflowView};

/// Loads a wizard layout from a YAML or JSON file.
///
/// Accepts either a document with a top-level `steps` list or a bare list of
/// steps.
pub fn parse_layout_file(file_path: impl AsRef<Path>) -> Result<WizardLayout> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read layout file: {}", file_path.display()))?;

    if let Ok(layout) = serde_yaml::from_str::<WizardLayout>(&content) {
        return Ok(layout);
    }

    if let Ok(steps) = serde_yaml::from_str::<Vec<Step>>(&content) {
        return Ok(WizardLayout { steps });
    }

    anyhow::bail!(
        "Unsupported layout document format in {}. Expected one of:\n\
         - Document with a 'steps' list\n\
         - Bare list of steps, each with 'title' and 'tabs'\n\
         ",
        file_path.display()
    );
}
