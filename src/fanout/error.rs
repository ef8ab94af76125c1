//! Error types for the fan-out system

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FanoutError {
    #[error("Fan-out registry unavailable: {0}")]
    Unavailable(String),
}

impl crate::core::error_handling::ContextualError for FanoutError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type FanoutResult<T> = Result<T, FanoutError>;
