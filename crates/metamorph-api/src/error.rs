use thiserror::Error;

use metamorph_core::store::StoreError;
use metamorph_runtime::OrchestratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    Conflict,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Mismatch(msg) => Self::InvalidArgument(msg),
            StoreError::Uninitialized => {
                Self::NotFound("no architecture snapshot recorded yet".to_string())
            }
            StoreError::VersionConflict { .. } => Self::Conflict(err.to_string()),
            StoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::NotFound(_) => Self::NotFound(err.to_string()),
            OrchestratorError::InvalidState { .. } | OrchestratorError::EmptyPlan(_) => {
                Self::InvalidState(err.to_string())
            }
            OrchestratorError::Store(store) => store.into(),
        }
    }
}
