//! Wizard configuration for the QE app CLI.
//!
//! Settings live in a small JSON file in the standard configuration directory
//! (`~/.config/qeapp/config.json` on most platforms). A missing file yields the
//! defaults. `QEAPP_CONFIG_PATH` relocates the file and `QEAPP_API_BASE`
//! overrides the backend URL regardless of what the file says.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs_next::{config_dir, home_dir};
use indexmap::IndexMap;
use qeapp_api::{API_BASE_ENV, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use qeapp_types::CodeConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable allowing callers to override the configuration file path.
pub const CONFIG_PATH_ENV: &str = "QEAPP_CONFIG_PATH";

/// Default filename for the JSON payload.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Error surfaced when reading the configuration fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure (for example, permissions).
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file exists but is not valid configuration JSON.
    #[error("config parse error at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings consumed by the CLI and the wizard engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WizardConfig {
    /// Backend base URL, including the `/api` prefix.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Upper bound for every backend request.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where wizard snapshots are written. Unset means state is not persisted.
    #[serde(default)]
    pub snapshot_path: Option<String>,
    /// YAML or JSON layout replacing the built-in steps.
    #[serde(default)]
    pub layout_path: Option<String>,
    /// Declared code defaults keyed by resource tab title, then code name.
    #[serde(default)]
    pub codes: IndexMap<String, IndexMap<String, CodeConfig>>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base(),
            request_timeout_secs: default_timeout_secs(),
            snapshot_path: None,
            layout_path: None,
            codes: IndexMap::new(),
        }
    }
}

impl WizardConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path.as_deref().map(expand_tilde)
    }

    pub fn layout_path(&self) -> Option<PathBuf> {
        self.layout_path.as_deref().map(expand_tilde)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base) = env::var(API_BASE_ENV)
            && !base.trim().is_empty()
        {
            debug!(base = %base, "backend URL overridden from environment");
            self.api_base_url = base.trim().to_string();
        }
    }
}

/// Returns the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("qeapp").join(CONFIG_FILE_NAME)
}

/// Loads configuration from the default path.
pub fn load_config() -> Result<WizardConfig, ConfigError> {
    load_config_from_path(&default_config_path())
}

/// Loads configuration from a specific path, then applies environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<WizardConfig, ConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            WizardConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
