//! Error types for the Pasteguard core.

use thiserror::Error;

/// Main error type for Pasteguard operations.
#[derive(Error, Debug)]
pub enum GuardError {
    /// The client exhausted one of the action's windows
    #[error("Too many requests, retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    /// Unknown, expired or already consumed paste
    #[error("Paste not found")]
    NotFound,

    /// Generated id already exists in storage
    #[error("Duplicate paste id: {0}")]
    DuplicateId(String),

    /// Storage backend failure
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The secure random source could not be read
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),

    /// Malformed paste submission
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Paste submission over a configured length limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// HTTP status code the request layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            GuardError::TooManyRequests { .. } => 429,
            GuardError::NotFound => 404,
            GuardError::BadRequest(_) => 400,
            GuardError::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }

    /// Value for the `Retry-After` header, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GuardError::TooManyRequests { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for GuardError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => GuardError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                GuardError::DuplicateId(db_err.message().to_string())
            }
            other => GuardError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for GuardError {
    fn from(err: config::ConfigError) -> Self {
        GuardError::Config(err.to_string())
    }
}

/// Result type alias for Pasteguard operations.
pub type Result<T> = std::result::Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(GuardError::TooManyRequests { retry_after_secs: 5 }.http_status(), 429);
        assert_eq!(GuardError::NotFound.http_status(), 404);
        assert_eq!(GuardError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(GuardError::PayloadTooLarge("x".into()).http_status(), 413);
        assert_eq!(GuardError::StorageUnavailable("x".into()).http_status(), 500);
        assert_eq!(GuardError::EntropyUnavailable("x".into()).http_status(), 500);
    }

    #[test]
    fn test_retry_after_only_on_denial() {
        let err = GuardError::TooManyRequests { retry_after_secs: 298 };
        assert_eq!(err.retry_after_secs(), Some(298));
        assert_eq!(GuardError::NotFound.retry_after_secs(), None);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: GuardError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, GuardError::NotFound));
    }
}
