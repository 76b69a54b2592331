//! # Metamorph Runtime
//!
//! Side-effecting machinery around the core logic:
//! - PlanExecutor: runs a plan's steps against the registry and the
//!   services' lifecycle contracts
//! - TransitionTracker: routing-scoped architecture transitions
//! - HealthMonitor: periodic heartbeat-driven health sweep
//! - HttpLifecycleClient: lifecycle contract over HTTP
//! - Orchestrator: plan creation, background generation and execution

mod executor;
mod health;
mod http_lifecycle;
mod orchestrator;
mod transitions;

pub use executor::{ExecutionError, PlanExecutor};
pub use health::HealthMonitor;
pub use http_lifecycle::HttpLifecycleClient;
pub use orchestrator::{Orchestrator, OrchestratorError, OrchestratorStatus, PlanCounts};
pub use transitions::{
    ArchitectureTransition, NoopRoutingApplier, RoutingApplier, TransitionStatus, TransitionTracker,
};
