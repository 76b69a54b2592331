use std::sync::Arc;

use metamorph_core::store::{
    CapabilityReport, RegistrationOutcome, ServiceRegistry, StateStore, StatusSummary,
};
use metamorph_core::types::{
    ArchitectureSnapshot, HeartbeatRequest, HistoryEntry, PlanStatus, ServiceDescriptor,
    ServiceQuery, ServiceStatus, StatusChange, TransformationPlan,
};
use metamorph_runtime::{
    ArchitectureTransition, Orchestrator, OrchestratorStatus, TransitionStatus, TransitionTracker,
};

use crate::dto::{
    CreatePlanRequest, PlanAccepted, RegisterResponse, TransitionRequest, TransitionSubmitResponse,
};
use crate::ApiError;

/// Registry facade: request validation and error mapping over the store.
#[derive(Clone)]
pub struct RegistryApi {
    registry: Arc<dyn ServiceRegistry>,
}

impl RegistryApi {
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub async fn register(
        &self,
        descriptor: ServiceDescriptor,
    ) -> Result<RegisterResponse, ApiError> {
        if descriptor.service_id.trim().is_empty() {
            return Err(ApiError::InvalidArgument(
                "service_id must not be empty".to_string(),
            ));
        }
        let service_id = descriptor.service_id.clone();
        let outcome = match self.registry.register(descriptor).await? {
            RegistrationOutcome::Registered => "registered",
            RegistrationOutcome::Updated => "updated",
        };
        Ok(RegisterResponse {
            service_id,
            outcome: outcome.to_string(),
        })
    }

    pub async fn get(&self, service_id: &str) -> Result<ServiceDescriptor, ApiError> {
        self.registry
            .get(service_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("service '{service_id}' not found")))
    }

    pub async fn list(
        &self,
        status: Option<ServiceStatus>,
    ) -> Result<Vec<ServiceDescriptor>, ApiError> {
        Ok(self.registry.list(status).await?)
    }

    pub async fn update(
        &self,
        service_id: &str,
        descriptor: ServiceDescriptor,
    ) -> Result<(), ApiError> {
        Ok(self.registry.update(service_id, descriptor).await?)
    }

    pub async fn deregister(&self, service_id: &str) -> Result<ServiceDescriptor, ApiError> {
        Ok(self.registry.deregister(service_id).await?)
    }

    pub async fn heartbeat(
        &self,
        service_id: &str,
        heartbeat: &HeartbeatRequest,
    ) -> Result<(), ApiError> {
        Ok(self.registry.heartbeat(service_id, heartbeat).await?)
    }

    pub async fn query(&self, query: &ServiceQuery) -> Result<Vec<ServiceDescriptor>, ApiError> {
        Ok(self.registry.query(query).await?)
    }

    pub async fn history(&self, service_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        Ok(self.registry.history(service_id).await?)
    }

    pub async fn status_changes(&self, limit: usize) -> Result<Vec<StatusChange>, ApiError> {
        Ok(self.registry.status_changes(limit).await?)
    }

    pub async fn summary(&self) -> Result<StatusSummary, ApiError> {
        Ok(self.registry.summary().await?)
    }

    pub async fn capabilities(&self) -> Result<CapabilityReport, ApiError> {
        Ok(self.registry.capabilities().await?)
    }
}

/// Orchestrator facade: plans, architecture state, and transitions.
#[derive(Clone)]
pub struct OrchestratorApi {
    orchestrator: Arc<Orchestrator>,
    state_store: Arc<dyn StateStore>,
    transitions: Arc<TransitionTracker>,
}

impl OrchestratorApi {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        state_store: Arc<dyn StateStore>,
        transitions: Arc<TransitionTracker>,
    ) -> Self {
        Self {
            orchestrator,
            state_store,
            transitions,
        }
    }

    pub async fn current_state(&self) -> Result<ArchitectureSnapshot, ApiError> {
        Ok(self.state_store.current().await?)
    }

    pub async fn state_history(
        &self,
        limit: usize,
    ) -> Result<Vec<ArchitectureSnapshot>, ApiError> {
        Ok(self.state_store.history(limit).await?)
    }

    pub async fn create_plan(
        &self,
        request: CreatePlanRequest,
    ) -> Result<TransformationPlan, ApiError> {
        if request.name.trim().is_empty() {
            return Err(ApiError::InvalidArgument(
                "name must not be empty".to_string(),
            ));
        }
        Ok(self
            .orchestrator
            .create_plan(
                request.name,
                request.description,
                request.target_state,
                request.auto_generate,
            )
            .await?)
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<TransformationPlan, ApiError> {
        Ok(self.orchestrator.get_plan(plan_id).await?)
    }

    pub async fn list_plans(&self) -> Result<Vec<TransformationPlan>, ApiError> {
        Ok(self.orchestrator.list_plans().await?)
    }

    pub async fn delete_plan(&self, plan_id: &str) -> Result<(), ApiError> {
        Ok(self.orchestrator.delete_plan(plan_id).await?)
    }

    /// Kick off step generation; the plan advances in the background.
    pub async fn generate(&self, plan_id: &str) -> Result<PlanAccepted, ApiError> {
        self.orchestrator.generate_in_background(plan_id).await?;
        Ok(PlanAccepted {
            plan_id: plan_id.to_string(),
            status: PlanStatus::Generating,
        })
    }

    /// Kick off plan execution; the plan advances in the background.
    pub async fn execute(&self, plan_id: &str) -> Result<PlanAccepted, ApiError> {
        self.orchestrator.execute_in_background(plan_id).await?;
        Ok(PlanAccepted {
            plan_id: plan_id.to_string(),
            status: PlanStatus::Executing,
        })
    }

    pub async fn status(&self) -> Result<OrchestratorStatus, ApiError> {
        Ok(self.orchestrator.status_summary().await?)
    }

    pub async fn submit_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionSubmitResponse, ApiError> {
        let transition_id = self
            .transitions
            .submit(request.from_state, request.to_state)
            .await;
        Ok(TransitionSubmitResponse {
            transition_id,
            status: TransitionStatus::Pending,
        })
    }

    pub async fn transition(&self, transition_id: &str) -> Result<ArchitectureTransition, ApiError> {
        self.transitions
            .status(transition_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("transition '{transition_id}' not found")))
    }
}
