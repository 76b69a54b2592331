//! Periodic heartbeat-driven health sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use metamorph_core::store::ServiceRegistry;

/// Background task that ages out silent services.
///
/// Every `interval`, asks the registry for one health-sweep pass: services
/// that have been silent longer than `heartbeat_timeout` degrade, and
/// services silent longer than twice that go offline.
pub struct HealthMonitor {
    registry: Arc<dyn ServiceRegistry>,
    heartbeat_timeout: Duration,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        heartbeat_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            heartbeat_timeout,
            interval,
        }
    }

    /// Spawn the monitor loop. The handle can be aborted on shutdown.
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            heartbeat_timeout_secs = self.heartbeat_timeout.as_secs(),
            interval_secs = self.interval.as_secs(),
            "health monitor started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately; skip it so a fresh start
            // does not sweep before anyone had a chance to heartbeat.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.registry.sweep_health(self.heartbeat_timeout).await {
                    Ok(changes) => {
                        for change in &changes {
                            info!(
                                service_id = %change.service_id,
                                new_status = %change.new_status,
                                reason = change.reason.as_deref().unwrap_or(""),
                                "health transition"
                            );
                        }
                    }
                    Err(err) => error!(error = %err, "health sweep failed"),
                }
            }
        })
    }
}
