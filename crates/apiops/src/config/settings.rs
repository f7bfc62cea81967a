//! Settings for one publish run, loaded from the environment.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secrets::SecretSource;

/// Management API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2022-08-01";
/// Override document looked up in the service directory when none is configured.
pub const DEFAULT_CONFIGURATION_FILE: &str = "configuration.yaml";
/// Environment variable holding the bearer token by default.
pub const DEFAULT_TOKEN_ENV_VAR: &str = "AZURE_BEARER_TOKEN";

pub const ENV_SERVICE_URL: &str = "API_MANAGEMENT_SERVICE_URL";
pub const ENV_SERVICE_DIRECTORY: &str = "API_MANAGEMENT_SERVICE_OUTPUT_FOLDER_PATH";
pub const ENV_CONFIGURATION_FILE: &str = "CONFIGURATION_YAML_PATH";
pub const ENV_COMMIT_ID: &str = "COMMIT_ID";
pub const ENV_API_VERSION: &str = "API_VERSION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherSettings {
    /// Service URI, e.g. `https://management.azure.com/subscriptions/../service/apim`.
    pub service_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Root of the artifact tree.
    pub service_directory: PathBuf,
    #[serde(default)]
    pub configuration_file: Option<PathBuf>,
    /// Publish only the files changed by this commit.
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default = "default_token")]
    pub token: SecretSource,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_token() -> SecretSource {
    SecretSource::env(DEFAULT_TOKEN_ENV_VAR)
}

impl PublisherSettings {
    /// Loads settings through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let service_url = get(ENV_SERVICE_URL).ok_or(ConfigError::MissingSetting {
            name: "service URL",
            env_var: ENV_SERVICE_URL,
        })?;
        let service_directory = get(ENV_SERVICE_DIRECTORY).ok_or(ConfigError::MissingSetting {
            name: "service directory",
            env_var: ENV_SERVICE_DIRECTORY,
        })?;

        Ok(Self {
            service_url,
            api_version: get(ENV_API_VERSION).unwrap_or_else(default_api_version),
            service_directory: PathBuf::from(service_directory),
            configuration_file: get(ENV_CONFIGURATION_FILE).map(PathBuf::from),
            commit_id: get(ENV_COMMIT_ID),
            token: default_token(),
        })
    }

    /// The override document to load, if any.
    ///
    /// An explicit path must exist. Otherwise `configuration.yaml` in the
    /// service directory is used when present.
    pub fn configuration_path(&self) -> Option<PathBuf> {
        match &self.configuration_file {
            Some(path) => Some(path.clone()),
            None => {
                let candidate = self.service_directory.join(DEFAULT_CONFIGURATION_FILE);
                candidate.is_file().then_some(candidate)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.service_url).map_err(|e| ConfigError::Validation {
            message: format!("Invalid service URL '{}': {}", self.service_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                message: format!("Service URL must be http(s): {}", self.service_url),
            });
        }

        if self.api_version.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "API version cannot be empty".to_string(),
            });
        }

        if !self.service_directory.is_dir() {
            return Err(ConfigError::Validation {
                message: format!(
                    "Service directory does not exist: {}",
                    self.service_directory.display()
                ),
            });
        }

        if let Some(path) = &self.configuration_file {
            check_file(path)?;
        }

        if self.commit_id.as_deref().is_some_and(|id| id.contains(char::is_whitespace)) {
            return Err(ConfigError::Validation {
                message: "Commit id cannot contain whitespace".to_string(),
            });
        }

        Ok(())
    }
}

fn check_file(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            message: format!("Configuration file does not exist: {}", path.display()),
        })
    }
}
