//! # Metamorph Config
//!
//! Unified single-file configuration for the metamorph server. A single
//! `metamorph.yaml` can configure the registry health machine, routing
//! transitions, the HTTP listener, and observability settings.

mod loader;

pub use loader::{load_config, ConfigError};

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetamorphConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub transitions: TransitionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "metamorph".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

/// Heartbeat-driven health machine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Seconds of silence before an active service degrades; twice this
    /// before a degraded service goes offline.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
    /// Seconds between health sweeps.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
}

impl RegistryConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            health_check_interval_secs: default_health_check_interval(),
        }
    }
}

fn default_heartbeat_timeout() -> u64 {
    60
}

fn default_health_check_interval() -> u64 {
    30
}

/// Routing-transition wait bounds used by the executor.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionsConfig {
    #[serde(default = "default_transition_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_transition_poll_interval")]
    pub poll_interval_secs: u64,
}

impl TransitionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_transition_timeout(),
            poll_interval_secs: default_transition_poll_interval(),
        }
    }
}

fn default_transition_timeout() -> u64 {
    60
}

fn default_transition_poll_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
