//! Shared primitives for all Rust crates in the recertification tracker.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across recert crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
///
/// Every failure surfaced across the crate boundary carries one of these
/// kinds so callers can branch on it. Unexpected store failures must be
/// logged with full detail at the point of conversion; the `Internal`
/// message carried to the caller stays generic.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation refused because required state is missing, naming what is missing.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state, such as a duplicate key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Delete or update blocked by a dependent row.
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
