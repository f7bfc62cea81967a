//! Publisher configuration.

pub mod settings;

pub use crate::error::ConfigError;
pub use settings::{
    PublisherSettings, DEFAULT_API_VERSION, DEFAULT_CONFIGURATION_FILE, DEFAULT_TOKEN_ENV_VAR,
};
