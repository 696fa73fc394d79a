//! Dunning error taxonomy.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | CampaignNotFound / RuleNotFound / WorkflowNotFound | 404 |
//! | InvalidRule / InvalidWorkflow / Validation | 422 |
//! | InvalidState | 409 |
//! | Conflict | 409 |
//! | LeaseUnavailable | 423 |
//! | TransientExternal | 503 |
//! | InvariantViolation / Infrastructure | 500 |

use crate::domain::foundation::{CampaignId, DomainError, ErrorCode, RuleId, WorkflowId};
use crate::domain::rules::RuleValidationError;
use crate::domain::workflow::WorkflowValidationError;

/// Errors raised by dunning operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DunningError {
    CampaignNotFound(CampaignId),

    RuleNotFound(RuleId),

    WorkflowNotFound {
        id: WorkflowId,
        version: Option<u32>,
    },

    /// Rule rejected at save time.
    InvalidRule(Vec<RuleValidationError>),

    /// Workflow rejected at save time.
    InvalidWorkflow(Vec<WorkflowValidationError>),

    /// Other malformed input.
    Validation { field: String, message: String },

    /// Operation not allowed in the campaign's current status.
    InvalidState { current: String, attempted: String },

    /// Gateway or dispatcher unreachable; retried by the scheduler.
    TransientExternal(String),

    /// Broken engine invariant, e.g. a campaign pointing at a missing node.
    InvariantViolation(String),

    /// Another worker holds the campaign lease.
    LeaseUnavailable(CampaignId),

    /// Optimistic version check failed on save.
    Conflict(CampaignId),

    Infrastructure(String),
}

impl DunningError {
    pub fn workflow_not_found(id: WorkflowId, version: Option<u32>) -> Self {
        DunningError::WorkflowNotFound { id, version }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DunningError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        DunningError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        DunningError::TransientExternal(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        DunningError::InvariantViolation(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        DunningError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DunningError::CampaignNotFound(_) => ErrorCode::CampaignNotFound,
            DunningError::RuleNotFound(_) => ErrorCode::RuleNotFound,
            DunningError::WorkflowNotFound { .. } => ErrorCode::WorkflowNotFound,
            DunningError::InvalidRule(_)
            | DunningError::InvalidWorkflow(_)
            | DunningError::Validation { .. } => ErrorCode::ValidationFailed,
            DunningError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            DunningError::TransientExternal(_) => ErrorCode::GatewayUnavailable,
            DunningError::InvariantViolation(_) => ErrorCode::InvariantViolation,
            DunningError::LeaseUnavailable(_) => ErrorCode::LeaseUnavailable,
            DunningError::Conflict(_) => ErrorCode::VersionConflict,
            DunningError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            DunningError::CampaignNotFound(id) => format!("Campaign not found: {}", id),
            DunningError::RuleNotFound(id) => format!("Rule not found: {}", id),
            DunningError::WorkflowNotFound { id, version: None } => {
                format!("Workflow not found: {}", id)
            }
            DunningError::WorkflowNotFound {
                id,
                version: Some(v),
            } => format!("Workflow not found: {} v{}", id, v),
            DunningError::InvalidRule(errors) => {
                format!("Rule is invalid: {}", join(errors))
            }
            DunningError::InvalidWorkflow(errors) => {
                format!("Workflow is invalid: {}", join(errors))
            }
            DunningError::Validation { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            DunningError::InvalidState { current, attempted } => {
                format!("Cannot {} campaign in {} state", attempted, current)
            }
            DunningError::TransientExternal(msg) => format!("External service unavailable: {}", msg),
            DunningError::InvariantViolation(msg) => format!("Invariant violated: {}", msg),
            DunningError::LeaseUnavailable(id) => {
                format!("Campaign {} is being processed by another worker", id)
            }
            DunningError::Conflict(id) => format!("Campaign {} was modified concurrently", id),
            DunningError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DunningError::TransientExternal(_)
                | DunningError::LeaseUnavailable(_)
                | DunningError::Conflict(_)
                | DunningError::Infrastructure(_)
        )
    }
}

fn join<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl std::fmt::Display for DunningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for DunningError {}

impl From<DomainError> for DunningError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => DunningError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => DunningError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.message,
            },
            ErrorCode::InvariantViolation => DunningError::InvariantViolation(err.message),
            ErrorCode::GatewayUnavailable | ErrorCode::DispatcherUnavailable => {
                DunningError::TransientExternal(err.message)
            }
            _ => DunningError::Infrastructure(err.to_string()),
        }
    }
}

impl From<DunningError> for DomainError {
    fn from(err: DunningError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
