//! Service lifecycle contract
//!
//! The minimal remote interface every managed service exposes to the
//! orchestrator: apply a new configuration, shut down gracefully.
//! Registration itself is handled at the registry, not at the service.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::types::ServiceSpec;

/// Lifecycle-contract error types
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("remote call to {endpoint} failed: {reason}")]
    RemoteCallFailure { endpoint: String, reason: String },
}

impl LifecycleError {
    pub fn remote(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteCallFailure {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Client side of the lifecycle contract, one suspension point per call.
#[async_trait]
pub trait LifecycleClient: Send + Sync {
    /// Push a new configuration to the live service (`PUT {endpoint}/config`).
    async fn apply_config(&self, endpoint: &str, config: &ServiceSpec)
        -> Result<(), LifecycleError>;

    /// Ask the service to stop gracefully (`POST {endpoint}/shutdown`).
    async fn shutdown(&self, endpoint: &str) -> Result<(), LifecycleError>;
}

/// Lifecycle client that records nothing and always succeeds.
///
/// Used in local mode and tests, where no managed service is actually
/// listening on the descriptor endpoints.
#[derive(Debug, Clone, Default)]
pub struct NoopLifecycleClient;

#[async_trait]
impl LifecycleClient for NoopLifecycleClient {
    async fn apply_config(
        &self,
        endpoint: &str,
        _config: &ServiceSpec,
    ) -> Result<(), LifecycleError> {
        debug!(endpoint, "noop lifecycle: apply_config");
        Ok(())
    }

    async fn shutdown(&self, endpoint: &str) -> Result<(), LifecycleError> {
        debug!(endpoint, "noop lifecycle: shutdown");
        Ok(())
    }
}
