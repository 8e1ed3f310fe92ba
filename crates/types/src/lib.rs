//! Strongly typed models shared by the QE app API client, wizard engine, and CLI.
//!
//! - [`wizard`]: steps, tab declarations, and tab payloads
//! - [`codes`]: compute resource declarations for named codes
//! - [`structure`]: backend and canonical crystal structure representations
//! - [`jobs`]: job, XPS, and code catalogue payloads returned by the backend

pub mod codes;
pub mod jobs;
pub mod structure;
pub mod wizard;

pub use codes::{CodeConfig, CodeOverride, DEFAULT_COUNT, coerce_count};
pub use jobs::{CodeDescriptor, DeleteJobOutcome, JobData, JobSummary, JobsPage, XpsSupport};
pub use structure::{BackendKind, BackendSite, BackendStructure, CanonicalStructure};
pub use wizard::{Step, TabData, TabKind, TabSpec, WizardLayout};
