//! Input validation for coordinator operations

use crate::core::error_handling::ContextualError;

/// Length of a valid mobile number
pub const MOBILE_LENGTH: usize = 10;

/// Validation error with a message suitable for the caller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ContextualError for ValidationError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// Normalise and check a mobile number
///
/// Surrounding whitespace is ignored; what remains must be exactly
/// [`MOBILE_LENGTH`] ASCII digits. Returns the trimmed number.
pub fn validate_mobile(mobile: &str) -> Result<String, ValidationError> {
    let trimmed = mobile.trim();
    if trimmed.len() != MOBILE_LENGTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::new(format!(
            "Valid {}-digit mobile number is required",
            MOBILE_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Require a non-blank text field, returning it trimmed
pub fn require_field(name: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{} is required", name)));
    }
    Ok(trimmed.to_string())
}

/// Token prefixes are short display tags such as `A` or `OPD`
pub fn validate_token_prefix(prefix: &str) -> Result<String, ValidationError> {
    let trimmed = require_field("tokenPrefix", prefix)?;
    if trimmed.len() > 8 || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "tokenPrefix must be 1-8 alphanumeric characters",
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_mobile_accepts_ten_digits() {
        assert_eq!(validate_mobile("9876543210").unwrap(), "9876543210");
        assert_eq!(validate_mobile("  9876543210 ").unwrap(), "9876543210");
    }

    #[test]
    fn test_validate_mobile_rejects_bad_input() {
        for bad in ["", "12345", "98765432101", "98765abcde", "+918765432"] {
            let err = validate_mobile(bad).unwrap_err();
            assert_eq!(err.message(), "Valid 10-digit mobile number is required");
        }
    }

    #[test]
    fn test_require_field() {
        assert_eq!(require_field("queueName", " OPD ").unwrap(), "OPD");
        let err = require_field("queueName", "   ").unwrap_err();
        assert_eq!(err.to_string(), "queueName is required");
        assert!(err.is_user_actionable());
    }

    #[test]
    fn test_validate_token_prefix() {
        assert_eq!(validate_token_prefix("A").unwrap(), "A");
        assert_eq!(validate_token_prefix("OPD2").unwrap(), "OPD2");
        assert!(validate_token_prefix("").is_err());
        assert!(validate_token_prefix("A-1").is_err());
        assert!(validate_token_prefix("TOOLONGPREFIX").is_err());
    }
}
