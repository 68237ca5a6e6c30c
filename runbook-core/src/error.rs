/// Error handling for Runbook
///
/// Every service operation returns `Result<T, Error>`. The variants separate
/// the four kinds of failure a caller has to react to differently:
///
/// - bad input ([`Error::Validation`]), rejected before anything is written
/// - stale references ([`Error::NotFound`])
/// - duplicate keys and already-resolved workflows ([`Error::Conflict`])
/// - infrastructure failures ([`Error::Database`]), the only retryable kind
///
/// Authorization, authentication and note decryption failures have their own
/// variants so the presentation layer can word them for the user.
///
/// # Example
///
/// ```
/// use runbook_core::error::Error;
///
/// let err = Error::invalid("team_code", "Team code must match NN-NNNN");
/// assert_eq!(err.to_string(), "Validation failed: team_code: Team code must match NN-NNNN");
/// assert!(!err.is_retryable());
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::password::PasswordError;
use crate::crypto::CryptoError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Unified domain error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input (422-equivalent)
    #[error("Validation failed: {}", FieldErrors(.0))]
    Validation(Vec<FieldError>),

    /// Referenced id or code does not resolve
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique key or a workflow that was already resolved
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Actor is not permitted to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Login failed or the account may not sign in
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Wrong passphrase or corrupted ciphertext
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Persistence failure; the transaction was rolled back
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A hashing or encryption primitive failed
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

struct FieldErrors<'a>(&'a [FieldError]);

impl fmt::Display for FieldErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl Error {
    /// Builds a single-field validation error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Whether the caller may retry the same operation unchanged
    ///
    /// Only infrastructure failures qualify. Domain errors will fail again
    /// until the input or the stored state changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_))
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Forbidden(_) => "forbidden",
            Error::Unauthorized(_) => "unauthorized",
            Error::Decryption(_) => "decryption_failed",
            Error::Database(_) => "database_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

/// Convert sqlx errors to domain errors
///
/// Unique-constraint violations become conflicts so callers can tell a
/// duplicate code or email apart from an unavailable database.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::Conflict(format!("Constraint violation: {}", db_err.message()))
            }
            other => Error::Database(other),
        }
    }
}

/// Convert validator errors to field errors
impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        Error::Validation(details)
    }
}

/// Convert password errors to domain errors
impl From<PasswordError> for Error {
    fn from(err: PasswordError) -> Self {
        Error::Internal(format!("Password operation failed: {}", err))
    }
}

/// Convert encryption errors to domain errors
impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption(msg) | CryptoError::MalformedInput(msg) => {
                Error::Decryption(msg)
            }
            CryptoError::KeyDerivation(msg) | CryptoError::Encryption(msg) => {
                Error::Internal(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");

        let err = Error::Conflict("Email already in use".to_string());
        assert_eq!(err.to_string(), "Conflict: Email already in use");
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = Error::Validation(vec![
            FieldError {
                field: "email".to_string(),
                message: "Invalid email format".to_string(),
            },
            FieldError {
                field: "password".to_string(),
                message: "Password too short".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: email: Invalid email format; password: Password too short"
        );
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_only_database_errors_are_retryable() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!Error::Conflict("dup".to_string()).is_retryable());
        assert!(!Error::NotFound("gone".to_string()).is_retryable());
        assert!(!Error::invalid("f", "m").is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_crypto_errors_map_to_decryption() {
        let err: Error = CryptoError::Decryption("bad tag".to_string()).into();
        assert!(matches!(err, Error::Decryption(_)));

        let err: Error = CryptoError::KeyDerivation("params".to_string()).into();
        assert!(matches!(err, Error::Internal(_)));
    }
}
