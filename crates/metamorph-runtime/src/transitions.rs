//! Routing-scoped architecture transitions.
//!
//! The executor's `update_routing` step does not mutate state directly; it
//! submits a transition (current state with only the routing field replaced)
//! and polls its status. The tracker applies the routing change in the
//! background through a `RoutingApplier` and records the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use metamorph_core::diff::diff;
use metamorph_core::lifecycle::LifecycleError;
use metamorph_core::types::{ArchitectureSnapshot, RoutingConfig};

/// Status of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One tracked transition between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureTransition {
    pub transition_id: String,
    pub from_state: ArchitectureSnapshot,
    pub to_state: ArchitectureSnapshot,
    pub status: TransitionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Applies a routing configuration to the traffic layer.
///
/// In a full deployment this would drive an API gateway or service mesh.
#[async_trait]
pub trait RoutingApplier: Send + Sync {
    async fn apply_routing(&self, routing: &RoutingConfig) -> Result<(), LifecycleError>;
}

/// Routing applier that only logs. Gateway integration is out of scope.
#[derive(Debug, Clone, Default)]
pub struct NoopRoutingApplier;

#[async_trait]
impl RoutingApplier for NoopRoutingApplier {
    async fn apply_routing(&self, routing: &RoutingConfig) -> Result<(), LifecycleError> {
        info!(paths = routing.paths.len(), "routing configuration applied");
        Ok(())
    }
}

/// Tracks submitted transitions and applies them in the background.
///
/// Clones share the same transition map; handing a clone to a background
/// task is the intended usage.
#[derive(Clone)]
pub struct TransitionTracker {
    transitions: Arc<RwLock<HashMap<String, ArchitectureTransition>>>,
    applier: Arc<dyn RoutingApplier>,
}

impl TransitionTracker {
    pub fn new(applier: Arc<dyn RoutingApplier>) -> Self {
        Self {
            transitions: Arc::new(RwLock::new(HashMap::new())),
            applier,
        }
    }

    /// Submit a transition and start applying it in the background.
    /// Returns the transition id for status polling.
    pub async fn submit(
        &self,
        from_state: ArchitectureSnapshot,
        to_state: ArchitectureSnapshot,
    ) -> String {
        let transition_id = format!("transition-{}", uuid::Uuid::new_v4());
        let now = Utc::now();
        let transition = ArchitectureTransition {
            transition_id: transition_id.clone(),
            from_state,
            to_state,
            status: TransitionStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.transitions
            .write()
            .await
            .insert(transition_id.clone(), transition);

        let tracker = self.clone();
        let id = transition_id.clone();
        tokio::spawn(async move {
            tracker.run(&id).await;
        });

        transition_id
    }

    /// Current state of one transition.
    pub async fn status(&self, transition_id: &str) -> Option<ArchitectureTransition> {
        self.transitions.read().await.get(transition_id).cloned()
    }

    async fn run(&self, transition_id: &str) {
        let Some((from_state, to_state)) = self
            .set_status(transition_id, TransitionStatus::InProgress, None)
            .await
        else {
            return;
        };

        // A transition is its own small diff -> steps -> apply cycle, scoped
        // to whatever actually changed between the two snapshots.
        let delta = diff(&from_state, &to_state);
        let result = match &delta.routing {
            Some(routing) => self.applier.apply_routing(routing).await,
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                info!(transition_id, "transition completed");
                self.set_status(transition_id, TransitionStatus::Completed, None)
                    .await;
            }
            Err(err) => {
                error!(transition_id, error = %err, "transition failed");
                self.set_status(
                    transition_id,
                    TransitionStatus::Failed,
                    Some(err.to_string()),
                )
                .await;
            }
        }
    }

    async fn set_status(
        &self,
        transition_id: &str,
        status: TransitionStatus,
        error: Option<String>,
    ) -> Option<(ArchitectureSnapshot, ArchitectureSnapshot)> {
        let mut transitions = self.transitions.write().await;
        let transition = transitions.get_mut(transition_id)?;
        transition.status = status;
        transition.error = error;
        transition.updated_at = Utc::now();
        Some((transition.from_state.clone(), transition.to_state.clone()))
    }
}
