//! Coordinator error taxonomy
//!
//! These are the errors callers of the coordinator see. Store, cache and
//! fan-out failures collapse into `Internal`, whose message is deliberately
//! generic; the underlying detail is only logged.

use crate::cache::api::CacheError;
use crate::core::error_handling::ContextualError;
use crate::core::validation::ValidationError;
use crate::fanout::api::FanoutError;
use crate::store::api::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    InvalidState { message: String },

    #[error("{0}")]
    Validation(ValidationError),

    /// Carries the existing token number so the client can recover it
    #[error("{message}")]
    Conflict {
        token_number: String,
        message: String,
    },

    #[error("{message}")]
    RateLimited {
        retry_after_secs: u64,
        message: String,
    },

    #[error("Internal error, please try again")]
    Internal { detail: String },
}

impl CoordinatorError {
    pub fn not_found(what: &str) -> Self {
        CoordinatorError::NotFound {
            message: format!("{} not found", what),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoordinatorError::InvalidState {
            message: message.into(),
        }
    }

    pub fn conflict(token_number: impl Into<String>) -> Self {
        let token_number = token_number.into();
        CoordinatorError::Conflict {
            message: format!(
                "You already have an active token {} in this queue",
                token_number
            ),
            token_number,
        }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        CoordinatorError::RateLimited {
            retry_after_secs,
            message: format!(
                "Please wait {} seconds before trying again",
                retry_after_secs
            ),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        CoordinatorError::Internal {
            detail: detail.into(),
        }
    }

    /// Short name of the taxonomy bucket
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::NotFound { .. } => "NotFound",
            CoordinatorError::InvalidState { .. } => "InvalidState",
            CoordinatorError::Validation(_) => "Validation",
            CoordinatorError::Conflict { .. } => "Conflict",
            CoordinatorError::RateLimited { .. } => "RateLimited",
            CoordinatorError::Internal { .. } => "Internal",
        }
    }
}

impl ContextualError for CoordinatorError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, CoordinatorError::Internal { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            CoordinatorError::NotFound { message }
            | CoordinatorError::InvalidState { message }
            | CoordinatorError::Conflict { message, .. }
            | CoordinatorError::RateLimited { message, .. } => Some(message),
            CoordinatorError::Validation(e) => Some(e.message()),
            CoordinatorError::Internal { .. } => None,
        }
    }
}

impl From<ValidationError> for CoordinatorError {
    fn from(err: ValidationError) -> Self {
        CoordinatorError::Validation(err)
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QueueNotFound { .. } => CoordinatorError::not_found("Queue"),
            StoreError::LocationNotFound { .. } => CoordinatorError::not_found("Location"),
            StoreError::TokenNotFound { .. } => CoordinatorError::not_found("Token"),
            StoreError::QueueClosed { .. } => CoordinatorError::invalid_state("Queue is closed"),
            StoreError::DuplicateActiveToken { token_number } => {
                CoordinatorError::conflict(token_number)
            }
            other => CoordinatorError::internal(other.to_string()),
        }
    }
}

impl From<CacheError> for CoordinatorError {
    fn from(err: CacheError) -> Self {
        CoordinatorError::internal(err.to_string())
    }
}

impl From<FanoutError> for CoordinatorError {
    fn from(err: FanoutError) -> Self {
        CoordinatorError::internal(err.to_string())
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
