//! # Metamorph Core
//!
//! Core types and deterministic logic for the Metamorph orchestrator.
//!
//! This crate contains:
//! - ServiceDescriptor / ArchitectureSnapshot / TransformationPlan / TransformationStep definitions
//! - Diff engine (structured delta between two snapshots)
//! - Plan generator (step synthesis, dependency edges, topological ordering)
//! - Registry / state-store / plan-store trait seams
//!
//! This crate does NOT care about:
//! - How steps are executed against live services
//! - How state is persisted
//! - How the API surface is exposed

pub mod diff;
pub mod lifecycle;
pub mod planner;
pub mod store;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::diff::{diff, Delta, ServiceChange};
    pub use crate::lifecycle::{LifecycleClient, LifecycleError, NoopLifecycleClient};
    pub use crate::planner::{PlanError, PlanGenerator};
    pub use crate::store::{
        CapabilityReport, PlanStore, RegistrationOutcome, ServiceRegistry, StateStore, StoreError,
        StatusSummary,
    };
    pub use crate::types::{
        ArchitectureSnapshot, ExecutionMetrics, HeartbeatRequest, HistoryAction, HistoryEntry,
        PlanStatus, RoutingConfig, ServiceDescriptor, ServiceQuery, ServiceSpec, ServiceStatus,
        StatusChange, StepAction, StepId, StepStatus, TransformationPlan, TransformationStep,
    };
}

pub use diff::{diff, Delta, ServiceChange};
pub use planner::{PlanError, PlanGenerator};
pub use store::StoreError;
pub use types::{
    ArchitectureSnapshot, PlanStatus, ServiceDescriptor, ServiceStatus, StepStatus,
    TransformationPlan, TransformationStep,
};
