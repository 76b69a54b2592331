//! # Metamorph Stores
//!
//! In-memory implementations of the core store traits:
//! - InMemoryServiceRegistry: descriptors, history, status changes, health sweep
//! - InMemoryStateStore: atomic version-checked snapshot append
//! - InMemoryPlanStore: transformation plan persistence
//!
//! State is held in memory; durability is the caller's concern.

mod plan_store;
mod registry;
mod state_store;

pub use plan_store::InMemoryPlanStore;
pub use registry::InMemoryServiceRegistry;
pub use state_store::InMemoryStateStore;
