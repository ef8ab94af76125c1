//! Durable store error types

use crate::store::model::TokenStatus;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Queue not found: {queue_id}")]
    QueueNotFound { queue_id: String },

    #[error("Location not found: {location_id}")]
    LocationNotFound { location_id: String },

    #[error("Token not found: {token_id}")]
    TokenNotFound { token_id: String },

    #[error("Queue is closed: {queue_id}")]
    QueueClosed { queue_id: String },

    #[error("Active token {token_number} already exists for this mobile")]
    DuplicateActiveToken { token_number: String },

    #[error("Token {token_id} is {actual}, expected {expected}")]
    StatusMismatch {
        token_id: String,
        expected: TokenStatus,
        actual: TokenStatus,
    },

    #[error("Illegal token transition {from} -> {to}")]
    InvalidTransition { from: TokenStatus, to: TokenStatus },

    #[error("Unique constraint violated on {field}: {value}")]
    UniqueViolation { field: String, value: String },

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl crate::core::error_handling::ContextualError for StoreError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
