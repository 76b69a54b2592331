//! Orchestrator facade
//!
//! Ties the stores, the generator, and the executor together:
//! - bootstraps the architecture history from the live registry
//! - creates plans against the current snapshot
//! - runs generation and execution in background tasks, serialized per plan

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use metamorph_core::planner::PlanGenerator;
use metamorph_core::store::{PlanStore, ServiceRegistry, StateStore, StoreError};
use metamorph_core::types::{ArchitectureSnapshot, PlanStatus, TransformationPlan};

use crate::executor::PlanExecutor;

/// Orchestrator error types
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("plan '{0}' not found")]
    NotFound(String),

    #[error("plan '{plan_id}' cannot {operation} in status {status:?}")]
    InvalidState {
        plan_id: String,
        operation: &'static str,
        status: PlanStatus,
    },

    #[error("plan '{0}' has no transformation steps")]
    EmptyPlan(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Plan counts for the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCounts {
    pub total: usize,
    /// Plans that are created, generating, ready, or executing
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Overall orchestrator state, as reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub initialized: bool,
    pub current_version: Option<u64>,
    pub plans: PlanCounts,
}

/// Coordinates plan lifecycle over the shared stores.
///
/// Clones share the stores and the per-plan locks; background tasks run on
/// clones of the orchestrator itself.
#[derive(Clone)]
pub struct Orchestrator {
    plan_store: Arc<dyn PlanStore>,
    state_store: Arc<dyn StateStore>,
    registry: Arc<dyn ServiceRegistry>,
    generator: PlanGenerator,
    executor: Arc<PlanExecutor>,
    // One lock per plan id so concurrent generate/execute requests for the
    // same plan serialize instead of clobbering each other's saves.
    plan_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl Orchestrator {
    pub fn new(
        plan_store: Arc<dyn PlanStore>,
        state_store: Arc<dyn StateStore>,
        registry: Arc<dyn ServiceRegistry>,
        executor: Arc<PlanExecutor>,
    ) -> Self {
        Self {
            plan_store,
            state_store,
            registry,
            generator: PlanGenerator::new(),
            executor,
            plan_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed the architecture history from the live registry when empty.
    ///
    /// Version 1 reflects whatever is registered at bootstrap time. Safe to
    /// call repeatedly; a concurrent initializer winning the race is fine.
    pub async fn ensure_initialized(&self) -> Result<(), OrchestratorError> {
        match self.state_store.current().await {
            Ok(_) => return Ok(()),
            Err(StoreError::Uninitialized) => {}
            Err(err) => return Err(err.into()),
        }

        let services = self.registry.snapshot_services().await?;
        let mut snapshot = ArchitectureSnapshot::new(1);
        snapshot.services = services;

        match self.state_store.append(snapshot).await {
            Ok(()) => {
                info!("architecture history initialized at version 1");
                Ok(())
            }
            Err(StoreError::VersionConflict { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a plan from the current snapshot to `target`.
    ///
    /// A missing target defaults to a copy of the current state, which yields
    /// an empty-delta plan useful for probing the pipeline. When
    /// `auto_generate` is set, step generation starts in the background
    /// immediately.
    pub async fn create_plan(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        target: Option<ArchitectureSnapshot>,
        auto_generate: bool,
    ) -> Result<TransformationPlan, OrchestratorError> {
        self.ensure_initialized().await?;
        let current = self.state_store.current().await?;
        let target = target.unwrap_or_else(|| current.clone());

        let plan = TransformationPlan::new(name, description, current, target);
        self.plan_store.save(&plan).await?;
        info!(plan_id = %plan.id, name = %plan.name, "transformation plan created");

        if auto_generate {
            self.spawn_generation(plan.id.clone());
        }
        Ok(plan)
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<TransformationPlan, OrchestratorError> {
        self.plan_store
            .load(plan_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(plan_id.to_string()))
    }

    pub async fn list_plans(&self) -> Result<Vec<TransformationPlan>, OrchestratorError> {
        Ok(self.plan_store.list().await?)
    }

    pub async fn delete_plan(&self, plan_id: &str) -> Result<(), OrchestratorError> {
        if self.plan_store.delete(plan_id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::NotFound(plan_id.to_string()))
        }
    }

    /// Validate and kick off step generation in the background.
    pub async fn generate_in_background(&self, plan_id: &str) -> Result<(), OrchestratorError> {
        let plan = self.get_plan(plan_id).await?;
        if !plan.status.can_generate() {
            return Err(OrchestratorError::InvalidState {
                plan_id: plan.id,
                operation: "generate",
                status: plan.status,
            });
        }
        self.spawn_generation(plan.id);
        Ok(())
    }

    /// Validate and kick off execution in the background.
    pub async fn execute_in_background(&self, plan_id: &str) -> Result<(), OrchestratorError> {
        let plan = self.get_plan(plan_id).await?;
        if !plan.status.can_execute() {
            return Err(OrchestratorError::InvalidState {
                plan_id: plan.id,
                operation: "execute",
                status: plan.status,
            });
        }
        if plan.steps.is_empty() {
            return Err(OrchestratorError::EmptyPlan(plan.id));
        }

        let orchestrator = self.clone();
        let id = plan.id;
        tokio::spawn(async move {
            orchestrator.run_execution(&id).await;
        });
        Ok(())
    }

    /// Current version and plan counts.
    pub async fn status_summary(&self) -> Result<OrchestratorStatus, OrchestratorError> {
        let current_version = match self.state_store.current().await {
            Ok(snapshot) => Some(snapshot.version),
            Err(StoreError::Uninitialized) => None,
            Err(err) => return Err(err.into()),
        };

        let mut counts = PlanCounts::default();
        for plan in self.plan_store.list().await? {
            counts.total += 1;
            match plan.status {
                PlanStatus::Completed => counts.completed += 1,
                PlanStatus::Failed => counts.failed += 1,
                _ => counts.active += 1,
            }
        }

        Ok(OrchestratorStatus {
            initialized: current_version.is_some(),
            current_version,
            plans: counts,
        })
    }

    fn spawn_generation(&self, plan_id: String) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_generation(&plan_id).await;
        });
    }

    async fn run_generation(&self, plan_id: &str) {
        let _guard = self.lock_plan(plan_id).await;
        let mut plan = match self.plan_store.load(plan_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                warn!(plan_id, "plan vanished before generation started");
                return;
            }
            Err(err) => {
                warn!(plan_id, error = %err, "loading plan for generation failed");
                return;
            }
        };

        // Failures transition the plan itself; the error needs no separate
        // channel back to the caller.
        if let Err(err) = self.generator.generate(&mut plan) {
            warn!(plan_id, error = %err, "plan generation failed");
        }
        if let Err(err) = self.plan_store.save(&plan).await {
            warn!(plan_id, error = %err, "saving generated plan failed");
        }
    }

    async fn run_execution(&self, plan_id: &str) {
        let _guard = self.lock_plan(plan_id).await;
        let mut plan = match self.plan_store.load(plan_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                warn!(plan_id, "plan vanished before execution started");
                return;
            }
            Err(err) => {
                warn!(plan_id, error = %err, "loading plan for execution failed");
                return;
            }
        };

        // A rejection here means the plan's status changed between the
        // validated request and this task winning the per-plan lock.
        if let Err(err) = self.executor.execute(&mut plan).await {
            warn!(plan_id, error = %err, "plan execution rejected");
            return;
        }
        if let Err(err) = self.plan_store.save(&plan).await {
            warn!(plan_id, error = %err, "saving executed plan failed");
        }
    }

    async fn lock_plan(&self, plan_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.plan_locks.lock().await;
            Arc::clone(
                locks
                    .entry(plan_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
