//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV_VAR: &str = "RELAY_CONFIG";

/// Environment variable overriding the listening port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Environment variable overriding the endpoint list (comma-separated).
pub const RPC_URLS_ENV_VAR: &str = "RELAY_RPC_URLS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidEnv { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::InvalidEnv { var, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, var)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: RelayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration the way the server binary does: the file named by
/// `RELAY_CONFIG` (or defaults), then environment overrides, then validation.
pub fn load_from_env() -> Result<RelayConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV_VAR) {
        Ok(path) => {
            let content = fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        Err(_) => RelayConfig::default(),
    };

    apply_overrides(
        &mut config,
        std::env::var(PORT_ENV_VAR).ok().as_deref(),
        std::env::var(RPC_URLS_ENV_VAR).ok().as_deref(),
    )?;

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `PORT` and `RELAY_RPC_URLS` style overrides.
pub fn apply_overrides(
    config: &mut RelayConfig,
    port: Option<&str>,
    rpc_urls: Option<&str>,
) -> Result<(), ConfigError> {
    if let Some(port) = port {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: PORT_ENV_VAR,
            value: port.to_string(),
        })?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    if let Some(urls) = rpc_urls {
        let endpoints: Vec<String> = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
            .collect();
        if endpoints.is_empty() {
            return Err(ConfigError::InvalidEnv {
                var: RPC_URLS_ENV_VAR,
                value: urls.to_string(),
            });
        }
        config.network.endpoints = endpoints;
    }

    Ok(())
}
