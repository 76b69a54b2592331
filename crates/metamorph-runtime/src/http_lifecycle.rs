//! Lifecycle contract over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use metamorph_core::lifecycle::{LifecycleClient, LifecycleError};
use metamorph_core::types::ServiceSpec;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `LifecycleClient` that speaks the real wire contract:
/// `PUT {endpoint}/config` with the service spec as JSON,
/// `POST {endpoint}/shutdown`.
pub struct HttpLifecycleClient {
    client: Client,
}

impl HttpLifecycleClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            // Builder only fails on TLS backend misconfiguration; the default
            // configuration used here cannot hit that path.
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpLifecycleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleClient for HttpLifecycleClient {
    async fn apply_config(
        &self,
        endpoint: &str,
        config: &ServiceSpec,
    ) -> Result<(), LifecycleError> {
        let url = format!("{}/config", endpoint.trim_end_matches('/'));
        debug!(%url, "pushing configuration");
        let response = self
            .client
            .put(&url)
            .json(config)
            .send()
            .await
            .map_err(|e| LifecycleError::remote(endpoint, e.to_string()))?;

        if !response.status().is_success() {
            return Err(LifecycleError::remote(
                endpoint,
                format!("config push returned {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn shutdown(&self, endpoint: &str) -> Result<(), LifecycleError> {
        let url = format!("{}/shutdown", endpoint.trim_end_matches('/'));
        debug!(%url, "requesting graceful shutdown");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| LifecycleError::remote(endpoint, e.to_string()))?;

        if !response.status().is_success() {
            return Err(LifecycleError::remote(
                endpoint,
                format!("shutdown returned {}", response.status()),
            ));
        }
        Ok(())
    }
}
