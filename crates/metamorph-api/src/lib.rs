//! # Metamorph API
//!
//! Service facades and wire views over the runtime: request validation,
//! error-code mapping, and the DTOs the HTTP surface exchanges.

mod dto;
mod error;
mod service;

pub use dto::{
    CreatePlanRequest, PlanAccepted, RegisterResponse, TransitionRequest, TransitionSubmitResponse,
};
pub use error::{ApiError, ErrorCode};
pub use service::{OrchestratorApi, RegistryApi};
