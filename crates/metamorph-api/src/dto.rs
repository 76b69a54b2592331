use serde::{Deserialize, Serialize};

use metamorph_core::types::{ArchitectureSnapshot, PlanStatus};
use metamorph_runtime::TransitionStatus;

/// Outcome of a register call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub service_id: String,
    /// "registered" for a new entry, "updated" for a replacement
    pub outcome: String,
}

/// Body for creating a transformation plan.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Missing target defaults to a copy of the current state
    #[serde(default)]
    pub target_state: Option<ArchitectureSnapshot>,
    /// Start step generation immediately after creation
    #[serde(default)]
    pub auto_generate: bool,
}

/// Acknowledgement for background generation/execution requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAccepted {
    pub plan_id: String,
    pub status: PlanStatus,
}

/// Body for submitting a routing-scoped transition directly.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub from_state: ArchitectureSnapshot,
    pub to_state: ArchitectureSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSubmitResponse {
    pub transition_id: String,
    pub status: TransitionStatus,
}
