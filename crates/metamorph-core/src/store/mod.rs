//! Store module
//!
//! This module provides the shared-resource abstractions:
//! - ServiceRegistry: authoritative service id -> descriptor mapping (async trait)
//! - StateStore: versioned, append-only snapshot history (async trait)
//! - PlanStore: transformation plan persistence (async trait)
//!
//! Note: Implementations are in the metamorph-stores crate

mod plan_store;
mod registry;
mod state_store;

pub use plan_store::PlanStore;
pub use registry::{CapabilityReport, RegistrationOutcome, ServiceRegistry, StatusSummary};
pub use state_store::StateStore;

use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("identifier mismatch: {0}")]
    Mismatch(String),

    #[error("architecture state not initialized")]
    Uninitialized,

    #[error("version conflict: expected {expected}, got {got}")]
    VersionConflict { expected: u64, got: u64 },

    #[error("internal store error: {0}")]
    Internal(String),
}
