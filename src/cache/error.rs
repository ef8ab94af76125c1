//! Cache error types

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Wrong value type for key {key}")]
    WrongType { key: String },
}

impl crate::core::error_handling::ContextualError for CacheError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
