//! Generic error handling utilities
//!
//! Every domain error in the crate can say whether it carries a message the
//! caller can act on (a malformed mobile number, a closed queue) or whether it
//! is a system failure that should be reported generically.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`. When it returns `false`, `user_message()` should return `None`
/// and the caller should fall back to a generic description of the operation.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error contains a specific, user-actionable message
    ///
    /// Examples of user-actionable errors:
    /// - Malformed mobile numbers
    /// - Operations on a closed queue
    /// - Duplicate active tokens
    ///
    /// Examples of system errors:
    /// - Store transaction failures
    /// - Cache connection loss
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors are logged with their own message; system errors
/// are logged with `operation_context` only and the detail goes to debug.
///
/// # Examples
/// ```rust,no_run
/// # use walkin::core::error_handling::log_error_with_context;
/// # use walkin::core::validation::ValidationError;
/// let err = ValidationError::new("Valid 10-digit mobile number is required");
/// log_error_with_context(&err, "Token admission");
/// // Logs: "FAILED: Valid 10-digit mobile number is required"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => {
            log::warn!("FAILED: {}: {}", operation_context, user_msg);
        }
        _ => {
            log::error!("FAILED: {}", operation_context);
        }
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct TestUserError {
        message: String,
    }

    impl fmt::Display for TestUserError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl std::error::Error for TestUserError {}

    impl ContextualError for TestUserError {
        fn is_user_actionable(&self) -> bool {
            true
        }

        fn user_message(&self) -> Option<&str> {
            Some(&self.message)
        }
    }

    #[derive(Debug)]
    struct TestSystemError {
        internal_details: String,
    }

    impl fmt::Display for TestSystemError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "System error: {}", self.internal_details)
        }
    }

    impl std::error::Error for TestSystemError {}

    impl ContextualError for TestSystemError {
        fn is_user_actionable(&self) -> bool {
            false
        }

        fn user_message(&self) -> Option<&str> {
            None
        }
    }

    #[test]
    fn test_user_actionable_error_shows_specific_message() {
        let error = TestUserError {
            message: "Queue is closed".to_string(),
        };

        assert!(error.is_user_actionable());
        assert_eq!(error.user_message(), Some("Queue is closed"));
        log_error_with_context(&error, "Token admission");
    }

    #[test]
    fn test_system_error_uses_generic_context() {
        let error = TestSystemError {
            internal_details: "Connection refused".to_string(),
        };

        assert!(!error.is_user_actionable());
        assert_eq!(error.user_message(), None);
        log_error_with_context(&error, "Call next token");
    }
}
