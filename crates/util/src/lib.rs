pub mod config;
pub mod http;

pub use config::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, ConfigError, WizardConfig, default_config_path, expand_tilde, load_config, load_config_from_path,
};
pub use http::status_error_message;
