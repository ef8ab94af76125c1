//! Dispatch error types

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Notifier transport error: {0}")]
    Transport(String),

    #[error("Notifier rejected request with status {status}")]
    Rejected { status: u16 },

    #[error("Notifier did not answer within {after_ms} ms")]
    Timeout { after_ms: u128 },

    #[error("Dispatch queue is full")]
    QueueFull,

    #[error("Dispatcher has shut down")]
    Closed,
}

impl crate::core::error_handling::ContextualError for DispatchError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
