//! Shared primitives for all Rust crates in rolegate.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across rolegate crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced role does not exist.
    #[error("role '{0}' was not found")]
    RoleNotFound(String),

    /// The user already holds an active assignment of the role.
    #[error("role '{role_id}' is already assigned to user '{user_id}'")]
    AlreadyAssigned {
        /// Role identifier.
        role_id: String,
        /// User identifier.
        user_id: String,
    },

    /// The user holds no active assignment of the role.
    #[error("role '{role_id}' is not assigned to user '{user_id}'")]
    NotAssigned {
        /// Role identifier.
        role_id: String,
        /// User identifier.
        user_id: String,
    },

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn non_empty_string_rejects_blank_json_value() {
        let result = serde_json::from_str::<NonEmptyString>("\"  \"");
        assert!(result.is_err());
    }

    #[test]
    fn assignment_errors_name_both_parties() {
        let error = AppError::AlreadyAssigned {
            role_id: "r1".to_owned(),
            user_id: "u1".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "role 'r1' is already assigned to user 'u1'"
        );
    }
}
