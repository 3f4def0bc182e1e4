//! Unified error handling for the workspace access-control core

use crate::domain::{EntityId, PropagationUnit, ResourceRef, SubjectId};
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Details of a propagation that updated the workspace but not every dependent.
///
/// `unit` is the exact delta that was being applied. Re-applying it is safe
/// because grant and revoke are idempotent.
#[derive(Debug, Clone)]
pub struct PartialPropagation {
    pub workspace_id: EntityId,
    /// Dependents that were not confirmed as updated
    pub pending: Vec<ResourceRef>,
    pub reason: String,
    pub unit: PropagationUnit,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Workspace {0} not found")]
    ContainerNotFound(EntityId),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Member {subject} not found in workspace {workspace_id}")]
    MemberNotFound {
        workspace_id: EntityId,
        subject: SubjectId,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error(
        "Propagation for workspace {} incomplete ({} dependents pending): {}",
        .0.workspace_id,
        .0.pending.len(),
        .0.reason
    )]
    PropagationPartialFailure(Box<PartialPropagation>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::ContainerNotFound(_) => "container_not_found",
            AppError::UnknownRole(_) => "unknown_role",
            AppError::InvalidParameter(_) => "invalid_parameter",
            AppError::MemberNotFound { .. } => "member_not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::UnsupportedOperation(_) => "unsupported_operation",
            AppError::PropagationPartialFailure(_) => "propagation_partial_failure",
            AppError::Configuration(_) => "configuration",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::PropagationPartialFailure(_) | AppError::Conflict(_)
        )
    }

    /// The unit to re-apply when this is a partial propagation failure
    pub fn pending_unit(&self) -> Option<&PropagationUnit> {
        match self {
            AppError::PropagationPartialFailure(partial) => Some(&partial.unit),
            _ => None,
        }
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidParameter(errors.to_string())
    }
}
