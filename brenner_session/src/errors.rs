//! Error types for session persistence

use thiserror::Error;

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage IO failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Stable code for callers that branch on the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidSessionId(_) => "INVALID_SESSION_ID",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
            Self::Io(_) => "IO_FAILED",
        }
    }
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(StorageError::NotFound("s".into()).code(), "SESSION_NOT_FOUND");
        assert_eq!(
            StorageError::InvalidSessionId("../x".into()).code(),
            "INVALID_SESSION_ID"
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(StorageError::from(io).code(), "IO_FAILED");
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(StorageError::from(bad).code(), "SERIALIZATION_FAILED");
    }

    #[test]
    fn test_display() {
        let err = StorageError::NotFound("RS-1".into());
        assert_eq!(err.to_string(), "Session not found: RS-1");
    }
}
