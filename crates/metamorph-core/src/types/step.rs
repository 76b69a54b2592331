//! Transformation step definitions
//!
//! TransformationStep is one atomic, typed action within a plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::snapshot::{RoutingConfig, ServiceSpec};

/// Strongly-typed step ID, unique within one plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Execution status of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
    /// A prerequisite did not complete; the step was not attempted
    Skipped,
}

/// Typed step payload - what the executor actually does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Register a new service with the full target config
    AddService {
        service_id: String,
        config: ServiceSpec,
    },
    /// Shut the service down (best-effort) and deregister it
    RemoveService { service_id: String },
    /// Push the full target config to the live service and the registry
    UpdateService {
        service_id: String,
        config: ServiceSpec,
        /// Field names that differ from the current state; informational
        #[serde(default)]
        changed_fields: Vec<String>,
    },
    /// Replace the routing configuration via a nested transition
    UpdateRouting { routing: RoutingConfig },
}

impl StepAction {
    /// The service this step targets, when it targets one.
    pub fn service_id(&self) -> Option<&str> {
        match self {
            StepAction::AddService { service_id, .. }
            | StepAction::RemoveService { service_id }
            | StepAction::UpdateService { service_id, .. } => Some(service_id),
            StepAction::UpdateRouting { .. } => None,
        }
    }

    /// Check whether this is a removal.
    pub fn is_removal(&self) -> bool {
        matches!(self, StepAction::RemoveService { .. })
    }

    fn describe(&self) -> String {
        match self {
            StepAction::AddService { service_id, .. } => {
                format!("Add new service: {service_id}")
            }
            StepAction::RemoveService { service_id } => {
                format!("Remove service: {service_id}")
            }
            StepAction::UpdateService { service_id, .. } => {
                format!("Update service: {service_id}")
            }
            StepAction::UpdateRouting { .. } => "Update routing configuration".to_string(),
        }
    }
}

/// A single step in a transformation plan. Owned by exactly one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationStep {
    /// Identifier unique within the owning plan
    pub id: StepId,
    /// The typed payload
    #[serde(flatten)]
    pub action: StepAction,
    /// Human-readable description
    pub description: String,
    /// IDs of steps this step depends on
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Current execution status
    #[serde(default)]
    pub status: StepStatus,
    /// Error detail when the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Completion timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransformationStep {
    /// Create a pending step with no dependencies.
    pub fn new(id: impl Into<StepId>, action: StepAction) -> Self {
        let description = action.describe();
        Self {
            id: id.into(),
            action,
            description,
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            error: None,
            completed_at: None,
        }
    }

    /// Add dependencies
    pub fn with_depends_on(mut self, deps: Vec<StepId>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Add a dependency, skipping duplicates.
    pub fn add_dependency(&mut self, dep: StepId) {
        if !self.depends_on.contains(&dep) {
            self.depends_on.push(dep);
        }
    }

    /// Check whether this is a removal step.
    pub fn is_removal(&self) -> bool {
        self.action.is_removal()
    }

    /// Mark the step as executing.
    pub fn start(&mut self) {
        self.status = StepStatus::Executing;
    }

    /// Mark the step as completed with a completion timestamp.
    pub fn complete(&mut self) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the step as failed with the error detail.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
    }

    /// Mark the step as skipped (unmet dependency).
    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
    }

    /// Reset to pending for a fresh execution attempt.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.error = None;
        self.completed_at = None;
    }
}
