//! Plan executor
//!
//! Runs a plan's steps strictly in the generated order against the service
//! registry and each affected service's lifecycle contract, then advances the
//! architecture state store on full success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use metamorph_core::lifecycle::{LifecycleClient, LifecycleError};
use metamorph_core::store::{ServiceRegistry, StateStore, StoreError};
use metamorph_core::types::{
    ExecutionMetrics, PlanStatus, RoutingConfig, ServiceDescriptor, ServiceSpec, ServiceStatus,
    StepAction, StepStatus, TransformationPlan,
};

use crate::transitions::{TransitionStatus, TransitionTracker};

const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TRANSITION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Execution error types
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("plan '{plan_id}' cannot be executed in status {status:?}")]
    InvalidState {
        plan_id: String,
        status: PlanStatus,
    },

    #[error("plan '{0}' has no transformation steps")]
    EmptyPlan(String),

    #[error("routing transition '{transition_id}' failed: {reason}")]
    TransitionFailed {
        transition_id: String,
        reason: String,
    },

    #[error("routing transition '{0}' timed out")]
    Timeout(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Runs transformation plans against the registry and live services.
pub struct PlanExecutor {
    registry: Arc<dyn ServiceRegistry>,
    state_store: Arc<dyn StateStore>,
    lifecycle: Arc<dyn LifecycleClient>,
    transitions: Arc<TransitionTracker>,
    transition_timeout: Duration,
    transition_poll_interval: Duration,
}

impl PlanExecutor {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        state_store: Arc<dyn StateStore>,
        lifecycle: Arc<dyn LifecycleClient>,
        transitions: Arc<TransitionTracker>,
    ) -> Self {
        Self {
            registry,
            state_store,
            lifecycle,
            transitions,
            transition_timeout: DEFAULT_TRANSITION_TIMEOUT,
            transition_poll_interval: DEFAULT_TRANSITION_POLL_INTERVAL,
        }
    }

    /// Override the nested routing-transition wait bound and poll interval.
    pub fn with_transition_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.transition_timeout = timeout;
        self.transition_poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Execute the plan's steps strictly in order.
    ///
    /// Returns `Err` only when the plan is rejected up front (wrong status or
    /// no steps); in that case the plan is left unchanged. Once the run has
    /// started, failures are recorded on the plan itself: a step whose
    /// dependencies did not complete is skipped (best-effort, not a hard
    /// abort), while the first step failure marks the plan failed and stops
    /// processing. Only a run with no failed step advances the state store.
    pub async fn execute(&self, plan: &mut TransformationPlan) -> Result<(), ExecutionError> {
        if !plan.status.can_execute() {
            return Err(ExecutionError::InvalidState {
                plan_id: plan.id.clone(),
                status: plan.status,
            });
        }
        if plan.steps.is_empty() {
            return Err(ExecutionError::EmptyPlan(plan.id.clone()));
        }

        info!(plan_id = %plan.id, steps = plan.steps.len(), "executing transformation plan");
        for step in &mut plan.steps {
            step.reset();
        }
        plan.start_executing();
        let started = Instant::now();

        for i in 0..plan.steps.len() {
            let dependencies_met = plan.steps[i].depends_on.iter().all(|dep| {
                plan.steps
                    .iter()
                    .any(|s| &s.id == dep && s.status == StepStatus::Completed)
            });
            if !dependencies_met {
                warn!(plan_id = %plan.id, step_id = %plan.steps[i].id, "skipping step, dependencies not met");
                plan.steps[i].skip();
                continue;
            }

            info!(plan_id = %plan.id, step_id = %plan.steps[i].id, description = %plan.steps[i].description, "executing step");
            plan.steps[i].start();
            let action = plan.steps[i].action.clone();

            match self.dispatch(&action).await {
                Ok(()) => plan.steps[i].complete(),
                Err(err) => {
                    warn!(plan_id = %plan.id, step_id = %plan.steps[i].id, error = %err, "step failed");
                    plan.steps[i].fail(err.to_string());
                    plan.metrics = Some(ExecutionMetrics::from_steps(
                        &plan.steps,
                        started.elapsed().as_millis() as u64,
                    ));
                    plan.fail(err.to_string());
                    return Ok(());
                }
            }
        }

        let metrics =
            ExecutionMetrics::from_steps(&plan.steps, started.elapsed().as_millis() as u64);

        let current = self.state_store.current().await?;
        let next = plan.target_state.advanced_from(&plan.id, current.version + 1);
        match self.state_store.append(next).await {
            Ok(()) => {
                info!(plan_id = %plan.id, completed = metrics.completed_steps, "transformation plan completed");
                plan.complete(metrics);
            }
            Err(err) => {
                warn!(plan_id = %plan.id, error = %err, "state-store append failed after execution");
                plan.metrics = Some(metrics);
                plan.fail(err.to_string());
            }
        }
        Ok(())
    }

    async fn dispatch(&self, action: &StepAction) -> Result<(), ExecutionError> {
        match action {
            StepAction::AddService { service_id, config } => {
                self.add_service(service_id, config).await
            }
            StepAction::RemoveService { service_id } => self.remove_service(service_id).await,
            StepAction::UpdateService {
                service_id, config, ..
            } => self.update_service(service_id, config).await,
            StepAction::UpdateRouting { routing } => self.update_routing(routing).await,
        }
    }

    /// Register a new descriptor in `starting` status.
    async fn add_service(
        &self,
        service_id: &str,
        config: &ServiceSpec,
    ) -> Result<(), ExecutionError> {
        let mut descriptor =
            descriptor_from_spec(service_id, config).with_status(ServiceStatus::Starting);
        if descriptor.resource_allocation.is_empty() {
            descriptor.resource_allocation =
                HashMap::from([("cpu".to_string(), 1.0), ("memory".to_string(), 1.0)]);
        }
        self.registry.register(descriptor).await?;
        info!(service_id, "service added");
        Ok(())
    }

    /// Shut the service down (best-effort) and deregister it. Tolerates a
    /// registry entry that no longer exists; the step reference is weak.
    async fn remove_service(&self, service_id: &str) -> Result<(), ExecutionError> {
        if let Some(existing) = self.registry.get(service_id).await? {
            if let Err(err) = self.lifecycle.shutdown(&existing.endpoint).await {
                warn!(service_id, error = %err, "graceful shutdown failed, deregistering anyway");
            }
        }

        match self.registry.deregister(service_id).await {
            Ok(_) => {
                info!(service_id, "service removed");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                warn!(service_id, "service already gone at removal time");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Push the full target config to the live service, then to the registry.
    async fn update_service(
        &self,
        service_id: &str,
        config: &ServiceSpec,
    ) -> Result<(), ExecutionError> {
        let endpoint = match self.registry.get(service_id).await? {
            Some(existing) => existing.endpoint,
            None => config.endpoint_or_default(service_id),
        };

        self.lifecycle.apply_config(&endpoint, config).await?;

        let mut descriptor = descriptor_from_spec(service_id, config);
        descriptor.endpoint = endpoint;
        self.registry.register(descriptor).await?;
        info!(service_id, "service updated");
        Ok(())
    }

    /// Drive a routing-only transition: current state with the routing field
    /// replaced, submitted to the tracker and polled with a bounded wait.
    async fn update_routing(&self, routing: &RoutingConfig) -> Result<(), ExecutionError> {
        let current = self.state_store.current().await?;
        let mut target = current.clone();
        target.routing = Some(routing.clone());

        let transition_id = self.transitions.submit(current, target).await;
        let deadline = Instant::now() + self.transition_timeout;

        loop {
            match self.transitions.status(&transition_id).await {
                Some(transition) => match transition.status {
                    TransitionStatus::Completed => return Ok(()),
                    TransitionStatus::Failed => {
                        return Err(ExecutionError::TransitionFailed {
                            transition_id,
                            reason: transition
                                .error
                                .unwrap_or_else(|| "unknown error".to_string()),
                        })
                    }
                    TransitionStatus::Pending | TransitionStatus::InProgress => {}
                },
                None => {
                    return Err(ExecutionError::TransitionFailed {
                        transition_id,
                        reason: "transition record lost".to_string(),
                    })
                }
            }

            if Instant::now() >= deadline {
                return Err(ExecutionError::Timeout(transition_id));
            }
            tokio::time::sleep(self.transition_poll_interval).await;
        }
    }
}

fn descriptor_from_spec(service_id: &str, config: &ServiceSpec) -> ServiceDescriptor {
    let mut descriptor =
        ServiceDescriptor::new(service_id, config.endpoint_or_default(service_id))
            .with_status(config.status)
            .with_capabilities(config.capabilities.clone())
            .with_resources(config.resource_allocation.clone());
    descriptor.dependencies = config.dependencies.clone();
    descriptor.scaling_factor = config.scaling_factor;
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use metamorph_core::planner::PlanGenerator;
    use metamorph_core::types::{ArchitectureSnapshot, StepId, TransformationStep};
    use metamorph_stores::{InMemoryServiceRegistry, InMemoryStateStore};
    use std::sync::Mutex;

    use crate::transitions::{NoopRoutingApplier, RoutingApplier};

    #[derive(Default)]
    struct RecordingLifecycle {
        calls: Mutex<Vec<String>>,
        fail_config: bool,
    }

    impl RecordingLifecycle {
        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_config: true,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LifecycleClient for RecordingLifecycle {
        async fn apply_config(
            &self,
            endpoint: &str,
            _config: &ServiceSpec,
        ) -> Result<(), LifecycleError> {
            self.calls.lock().unwrap().push(format!("config {endpoint}"));
            if self.fail_config {
                return Err(LifecycleError::remote(endpoint, "config push refused"));
            }
            Ok(())
        }

        async fn shutdown(&self, endpoint: &str) -> Result<(), LifecycleError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("shutdown {endpoint}"));
            Ok(())
        }
    }

    struct Fixture {
        registry: Arc<InMemoryServiceRegistry>,
        state_store: Arc<InMemoryStateStore>,
        lifecycle: Arc<RecordingLifecycle>,
        executor: PlanExecutor,
    }

    fn fixture(lifecycle: RecordingLifecycle, initial: ArchitectureSnapshot) -> Fixture {
        let registry = Arc::new(InMemoryServiceRegistry::new());
        let state_store = Arc::new(InMemoryStateStore::with_initial(initial));
        let lifecycle = Arc::new(lifecycle);
        let transitions = Arc::new(TransitionTracker::new(Arc::new(NoopRoutingApplier)));
        let executor = PlanExecutor::new(
            registry.clone(),
            state_store.clone(),
            lifecycle.clone(),
            transitions,
        )
        .with_transition_timing(Duration::from_secs(2), Duration::from_millis(10));
        Fixture {
            registry,
            state_store,
            lifecycle,
            executor,
        }
    }

    fn spec_with_caps(caps: &[&str]) -> ServiceSpec {
        ServiceSpec {
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            ..ServiceSpec::default()
        }
    }

    #[tokio::test]
    async fn test_full_scenario_advances_state_to_version_two() {
        // v1: {A: active, caps=[x]}, no routing.
        let from =
            ArchitectureSnapshot::new(1).with_service("A", spec_with_caps(&["x"]));
        let to = ArchitectureSnapshot::new(1)
            .with_service("A", spec_with_caps(&["x", "y"]))
            .with_service("B", spec_with_caps(&["z"]))
            .with_routing(
                RoutingConfig::new().with_path("p1", vec!["A".to_string(), "B".to_string()]),
            );

        let fx = fixture(RecordingLifecycle::default(), from.clone());
        fx.registry
            .register(ServiceDescriptor::new("A", "http://A:8000"))
            .await
            .unwrap();

        let mut plan =
            TransformationPlan::new("scale-out", "grow A, add B, route p1", from, to.clone());
        PlanGenerator::new().generate(&mut plan).unwrap();

        fx.executor.execute(&mut plan).await.unwrap();

        assert_eq!(plan.status, PlanStatus::Completed);
        let metrics = plan.metrics.unwrap();
        assert_eq!(metrics.completed_steps, 3);
        assert_eq!(metrics.failed_steps, 0);

        let current = fx.state_store.current().await.unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.services, to.services);
        assert_eq!(current.routing, to.routing);

        // B registered in starting status; A's config was pushed.
        let b = fx.registry.get("B").await.unwrap().unwrap();
        assert_eq!(b.status, ServiceStatus::Starting);
        assert_eq!(b.resource_allocation.get("cpu"), Some(&1.0));
        assert!(fx
            .lifecycle
            .calls()
            .contains(&"config http://A:8000".to_string()));
    }

    #[tokio::test]
    async fn test_plan_in_wrong_status_is_rejected_unchanged() {
        let fx = fixture(RecordingLifecycle::default(), ArchitectureSnapshot::new(1));
        let mut plan = TransformationPlan::new(
            "wrong",
            "still created",
            ArchitectureSnapshot::new(1),
            ArchitectureSnapshot::new(1),
        );
        plan.steps.push(TransformationStep::new(
            "step-1",
            StepAction::RemoveService {
                service_id: "a".to_string(),
            },
        ));

        let err = fx.executor.execute(&mut plan).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidState { .. }));
        assert_eq!(plan.status, PlanStatus::Created);
        assert_eq!(plan.steps[0].status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn test_empty_plan_is_rejected_unchanged() {
        let fx = fixture(RecordingLifecycle::default(), ArchitectureSnapshot::new(1));
        let mut plan = TransformationPlan::new(
            "empty",
            "no steps",
            ArchitectureSnapshot::new(1),
            ArchitectureSnapshot::new(1),
        );
        plan.set_status(PlanStatus::Ready);

        let err = fx.executor.execute(&mut plan).await.unwrap_err();
        assert!(matches!(err, ExecutionError::EmptyPlan(_)));
        assert_eq!(plan.status, PlanStatus::Ready);
    }

    #[tokio::test]
    async fn test_first_failure_stops_processing_and_preserves_state() {
        let from = ArchitectureSnapshot::new(1).with_service("A", spec_with_caps(&["x"]));
        let fx = fixture(RecordingLifecycle::failing(), from.clone());
        fx.registry
            .register(ServiceDescriptor::new("A", "http://A:8000"))
            .await
            .unwrap();

        let mut plan = TransformationPlan::new(
            "failing",
            "update then add",
            from,
            ArchitectureSnapshot::new(1),
        );
        plan.steps = vec![
            TransformationStep::new(
                "step-1",
                StepAction::UpdateService {
                    service_id: "A".to_string(),
                    config: spec_with_caps(&["x", "y"]),
                    changed_fields: vec!["capabilities".to_string()],
                },
            ),
            TransformationStep::new(
                "step-2",
                StepAction::AddService {
                    service_id: "B".to_string(),
                    config: spec_with_caps(&["z"]),
                },
            ),
        ];
        plan.set_status(PlanStatus::Ready);

        fx.executor.execute(&mut plan).await.unwrap();

        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(plan.steps[0].status, StepStatus::Failed);
        assert!(plan.steps[0].error.as_deref().unwrap().contains("refused"));
        // Steps after the failure are never attempted.
        assert_eq!(plan.steps[1].status, StepStatus::Pending);
        assert!(fx.registry.get("B").await.unwrap().is_none());
        // No partial version bump.
        assert_eq!(fx.state_store.current().await.unwrap().version, 1);

        let metrics = plan.metrics.unwrap();
        assert_eq!(metrics.failed_steps, 1);
        assert_eq!(metrics.completed_steps, 0);
    }

    #[tokio::test]
    async fn test_unmet_dependency_skips_step_but_plan_completes() {
        let fx = fixture(RecordingLifecycle::default(), ArchitectureSnapshot::new(1));

        let mut plan = TransformationPlan::new(
            "skippy",
            "dependency scheduled later",
            ArchitectureSnapshot::new(1),
            ArchitectureSnapshot::new(1).with_service("B", spec_with_caps(&["z"])),
        );
        // step-1 depends on step-2, which the order places after it; the
        // dependency can never be completed when step-1 is considered.
        plan.steps = vec![
            TransformationStep::new(
                "step-1",
                StepAction::RemoveService {
                    service_id: "ghost".to_string(),
                },
            )
            .with_depends_on(vec![StepId::from("step-2")]),
            TransformationStep::new(
                "step-2",
                StepAction::AddService {
                    service_id: "B".to_string(),
                    config: spec_with_caps(&["z"]),
                },
            ),
        ];
        plan.set_status(PlanStatus::Ready);

        fx.executor.execute(&mut plan).await.unwrap();

        assert_eq!(plan.steps[0].status, StepStatus::Skipped);
        assert_eq!(plan.steps[1].status, StepStatus::Completed);
        // Skips do not fail the plan; the state store still advances.
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(fx.state_store.current().await.unwrap().version, 2);
        assert_eq!(plan.metrics.unwrap().skipped_steps, 1);
    }

    struct HangingApplier;

    #[async_trait]
    impl RoutingApplier for HangingApplier {
        async fn apply_routing(&self, _routing: &RoutingConfig) -> Result<(), LifecycleError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_routing_transition_times_out_and_fails_plan() {
        let from = ArchitectureSnapshot::new(1);
        let registry = Arc::new(InMemoryServiceRegistry::new());
        let state_store = Arc::new(InMemoryStateStore::with_initial(from.clone()));
        let transitions = Arc::new(TransitionTracker::new(Arc::new(HangingApplier)));
        let executor = PlanExecutor::new(
            registry,
            state_store.clone(),
            Arc::new(RecordingLifecycle::default()),
            transitions,
        )
        .with_transition_timing(Duration::from_millis(200), Duration::from_millis(20));

        let routing = RoutingConfig::new().with_path("p1", vec!["a".to_string()]);
        let mut plan = TransformationPlan::new(
            "stuck-routing",
            "routing change that never lands",
            from.clone(),
            from.with_routing(routing.clone()),
        );
        plan.steps = vec![TransformationStep::new(
            "step-1",
            StepAction::UpdateRouting { routing },
        )];
        plan.set_status(PlanStatus::Ready);

        executor.execute(&mut plan).await.unwrap();

        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(plan.steps[0].status, StepStatus::Failed);
        assert!(plan.steps[0].error.as_deref().unwrap().contains("timed out"));
        // The wait bound expired without a commit; the store keeps its version.
        assert_eq!(state_store.current().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_remove_service_tolerates_missing_registry_entry() {
        let fx = fixture(RecordingLifecycle::default(), ArchitectureSnapshot::new(1));

        let mut plan = TransformationPlan::new(
            "remove-gone",
            "remove a service that is already gone",
            ArchitectureSnapshot::new(1).with_service("ghost", spec_with_caps(&[])),
            ArchitectureSnapshot::new(1),
        );
        plan.steps = vec![TransformationStep::new(
            "step-1",
            StepAction::RemoveService {
                service_id: "ghost".to_string(),
            },
        )];
        plan.set_status(PlanStatus::Ready);

        fx.executor.execute(&mut plan).await.unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);
        // No registry entry, so no shutdown call was attempted.
        assert!(fx.lifecycle.calls().is_empty());
    }
}
