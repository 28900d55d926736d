//! Client configuration loading from a TOML file and the environment.
//!
//! Values are resolved in three layers: built-in defaults, then the optional
//! `envelope-sync.toml` file (or the path in `ENVELOPE_CONFIG`), then
//! environment overrides such as `ENVELOPE_API_URL`.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the optional config file
pub const DEFAULT_CONFIG_PATH: &str = "envelope-sync.toml";

const CONFIG_PATH_VAR: &str = "ENVELOPE_CONFIG";
const BASE_URL_VAR: &str = "ENVELOPE_API_URL";
const TIMEOUT_VAR: &str = "ENVELOPE_REQUEST_TIMEOUT_SECS";

/// Settings for talking to the remote ledger service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the remote service, without the `/api` prefix
    pub base_url: String,
    /// Optional per-request timeout; no timeout when absent
    pub request_timeout_secs: Option<u64>,
    /// Default `tracing` filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Rejects a base URL that is not absolute http(s).
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config {
                message: format!("base_url must start with http:// or https://, got '{}'", self.base_url),
            });
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(BASE_URL_VAR) {
            debug!("{} overrides base_url", BASE_URL_VAR);
            self.base_url = url;
        }
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs = raw.trim().parse::<u64>().map_err(|e| Error::Config {
                message: format!("{TIMEOUT_VAR} must be a whole number of seconds: {e}"),
            })?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(self)
    }
}

/// Loads client configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file {:?}: {e}", path.as_ref()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {:?}: {e}", path.as_ref()),
    })
}

/// Resolves the configuration for this process.
///
/// A missing config file is not an error; defaults apply.
pub fn load_client_configuration() -> Result<ClientConfig> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = if Path::new(&path).exists() {
        info!("Loading configuration from {}", path);
        load_config(&path)?
    } else {
        debug!("No config file at {}, using defaults", path);
        ClientConfig::default()
    };
    let config = config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_client_config() {
        let toml_str = r#"
            base_url = "https://ledger.example.com"
            request_timeout_secs = 15
        "#;

        let config: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://ledger.example.com");
        assert_eq!(config.request_timeout_secs, Some(15));
        assert_eq!(config.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides_file() {
        let config = ClientConfig::default()
            .apply_overrides(|name| match name {
                "ENVELOPE_API_URL" => Some("https://override.example.com".to_string()),
                "ENVELOPE_REQUEST_TIMEOUT_SECS" => Some("30".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.base_url, "https://override.example.com");
        assert_eq!(config.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_bad_timeout_override_rejected() {
        let result = ClientConfig::default().apply_overrides(|name| {
            (name == "ENVELOPE_REQUEST_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let config = ClientConfig {
            base_url: "localhost:8000".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_config("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
