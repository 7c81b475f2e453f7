//! Domain errors for the Concierge orchestrator.

use thiserror::Error;

use super::models::ConversationMode;

/// Domain-level errors that can occur while orchestrating a conversation.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Unknown conversation mode requested: {0}")]
    UnknownMode(String),

    #[error("Operation '{operation}' is not allowed in mode {mode}")]
    InvalidModeForOperation {
        operation: &'static str,
        mode: ConversationMode,
    },

    #[error("No plan is available for this conversation")]
    NoPlan,

    #[error("A run is already in progress for conversation {0}")]
    RunInProgress(String),

    #[error("Planning request was superseded by a newer request")]
    PlanningCancelled,

    #[error("Failure code {0} cannot be recovered by replanning")]
    NotReplannable(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid extraction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Store error: {0}")]
    StoreError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
