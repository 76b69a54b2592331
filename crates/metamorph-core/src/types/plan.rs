//! Transformation plan definitions
//!
//! TransformationPlan carries one snapshot to another through an ordered,
//! dependency-resolved sequence of steps, with a monotonic status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::ArchitectureSnapshot;
use super::step::{StepStatus, TransformationStep};

/// Plan status machine.
///
/// Monotonic along created -> generating -> ready -> executing -> completed,
/// with failed reachable from generating and executing. Never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Created,
    Generating,
    Ready,
    Executing,
    Completed,
    Failed,
}

impl PlanStatus {
    /// Check whether generation may start from this status.
    pub fn can_generate(&self) -> bool {
        matches!(self, PlanStatus::Created)
    }

    /// Check whether execution may start from this status.
    ///
    /// A failed plan may be re-executed; its steps carry their prior state.
    pub fn can_execute(&self) -> bool {
        matches!(self, PlanStatus::Ready | PlanStatus::Failed)
    }

    /// Check whether this status is terminal for the happy path.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed)
    }
}

/// Execution metrics recorded once a plan has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl ExecutionMetrics {
    /// Tally metrics from the recorded step statuses.
    pub fn from_steps(steps: &[TransformationStep], duration_ms: u64) -> Self {
        let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();
        Self {
            total_steps: steps.len(),
            completed_steps: count(StepStatus::Completed),
            failed_steps: count(StepStatus::Failed),
            skipped_steps: count(StepStatus::Skipped),
            duration_ms,
        }
    }
}

/// An ordered, dependency-resolved transition between two snapshots.
///
/// References both snapshots by value so the plan stays reproducible even if
/// history advances underneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationPlan {
    /// Unique identifier
    pub id: String,
    /// Human name
    pub name: String,
    /// Human description
    pub description: String,
    /// The state the plan transitions from
    pub current_state: ArchitectureSnapshot,
    /// The state the plan transitions to
    pub target_state: ArchitectureSnapshot,
    /// Ordered steps; valid topological order once status is ready
    #[serde(default)]
    pub steps: Vec<TransformationStep>,
    /// Current plan status
    #[serde(default)]
    pub status: PlanStatus,
    /// Error recorded on generation or execution failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Metrics recorded once the plan has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ExecutionMetrics>,
}

impl TransformationPlan {
    /// Create a new plan in `created` status.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        current_state: ArchitectureSnapshot,
        target_state: ArchitectureSnapshot,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            current_state,
            target_state,
            steps: Vec::new(),
            status: PlanStatus::Created,
            error: None,
            created_at: now,
            updated_at: now,
            metrics: None,
        }
    }

    /// Update the plan status, stamping `updated_at`.
    pub fn set_status(&mut self, status: PlanStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Transition to generating.
    pub fn start_generating(&mut self) {
        self.set_status(PlanStatus::Generating);
    }

    /// Attach the ordered steps and transition to ready.
    pub fn make_ready(&mut self, steps: Vec<TransformationStep>) {
        self.steps = steps;
        self.set_status(PlanStatus::Ready);
    }

    /// Transition to executing.
    pub fn start_executing(&mut self) {
        self.set_status(PlanStatus::Executing);
    }

    /// Transition to completed, recording metrics.
    pub fn complete(&mut self, metrics: ExecutionMetrics) {
        self.metrics = Some(metrics);
        self.set_status(PlanStatus::Completed);
    }

    /// Transition to failed, recording the error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.set_status(PlanStatus::Failed);
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&TransformationStep> {
        self.steps.iter().find(|s| s.id.as_str() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServiceSpec, StepAction};

    fn sample_plan() -> TransformationPlan {
        TransformationPlan::new(
            "scale out",
            "add billing",
            ArchitectureSnapshot::new(1),
            ArchitectureSnapshot::new(1),
        )
    }

    #[test]
    fn test_status_gates() {
        assert!(PlanStatus::Created.can_generate());
        assert!(!PlanStatus::Ready.can_generate());
        assert!(PlanStatus::Ready.can_execute());
        assert!(PlanStatus::Failed.can_execute());
        assert!(!PlanStatus::Executing.can_execute());
        assert!(!PlanStatus::Created.can_execute());
    }

    #[test]
    fn test_plan_transitions_stamp_updated_at() {
        let mut plan = sample_plan();
        let created = plan.updated_at;
        assert_eq!(plan.status, PlanStatus::Created);

        plan.start_generating();
        assert_eq!(plan.status, PlanStatus::Generating);
        assert!(plan.updated_at >= created);

        plan.make_ready(vec![TransformationStep::new(
            "step-1",
            StepAction::AddService {
                service_id: "billing".to_string(),
                config: ServiceSpec::default(),
            },
        )]);
        assert_eq!(plan.status, PlanStatus::Ready);
        assert_eq!(plan.steps.len(), 1);

        plan.fail("remote call failed");
        assert_eq!(plan.status, PlanStatus::Failed);
        assert!(plan.error.is_some());
    }

    #[test]
    fn test_metrics_tally() {
        let mut steps = vec![
            TransformationStep::new(
                "step-1",
                StepAction::RemoveService {
                    service_id: "a".to_string(),
                },
            ),
            TransformationStep::new(
                "step-2",
                StepAction::RemoveService {
                    service_id: "b".to_string(),
                },
            ),
            TransformationStep::new(
                "step-3",
                StepAction::RemoveService {
                    service_id: "c".to_string(),
                },
            ),
        ];
        steps[0].complete();
        steps[1].fail("boom");
        steps[2].skip();

        let metrics = ExecutionMetrics::from_steps(&steps, 42);
        assert_eq!(metrics.total_steps, 3);
        assert_eq!(metrics.completed_steps, 1);
        assert_eq!(metrics.failed_steps, 1);
        assert_eq!(metrics.skipped_steps, 1);
        assert_eq!(metrics.duration_ms, 42);
    }
}
