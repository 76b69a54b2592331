//! Configuration loading, validation, and environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::MetamorphConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load configuration from a YAML file, or defaults when `path` is None,
/// then apply environment overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<MetamorphConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        }
        None => MetamorphConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Deploy-time knobs that are commonly set per environment without a file.
fn apply_env_overrides(config: &mut MetamorphConfig) -> Result<(), ConfigError> {
    if let Some(timeout) = env_u64("HEARTBEAT_TIMEOUT")? {
        config.registry.heartbeat_timeout_secs = timeout;
    }
    if let Some(interval) = env_u64("HEALTH_CHECK_INTERVAL")? {
        config.registry.health_check_interval_secs = interval;
    }
    if let Ok(listen) = env::var("METAMORPH_LISTEN") {
        config.server.listen = listen;
    }
    Ok(())
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} must be an integer: '{value}'"))),
        Err(_) => Ok(None),
    }
}

fn validate_config(config: &MetamorphConfig) -> Result<(), ConfigError> {
    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.registry.heartbeat_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "registry.heartbeat_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.registry.health_check_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "registry.health_check_interval_secs must be > 0".to_string(),
        ));
    }

    if config.transitions.poll_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "transitions.poll_interval_secs must be > 0".to_string(),
        ));
    }

    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "server.listen must not be empty".to_string(),
        ));
    }

    Ok(())
}
