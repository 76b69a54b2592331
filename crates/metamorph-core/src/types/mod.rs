//! Core type definitions for Metamorph
//!
//! This module contains the fundamental types used throughout the system:
//! - ServiceDescriptor: declared configuration and liveness of one service
//! - ArchitectureSnapshot: versioned, immutable view of the whole topology
//! - TransformationPlan: ordered, dependency-resolved transition between two snapshots
//! - TransformationStep: one atomic, typed action within a plan

mod plan;
mod service;
mod snapshot;
mod step;

pub use plan::{ExecutionMetrics, PlanStatus, TransformationPlan};
pub use service::{
    HeartbeatRequest, HistoryAction, HistoryEntry, ServiceDescriptor, ServiceQuery, ServiceStatus,
    StatusChange,
};
pub use snapshot::{ArchitectureSnapshot, RoutingConfig, ServiceSpec};
pub use step::{StepAction, StepId, StepStatus, TransformationStep};
