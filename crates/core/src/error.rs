//! Error types for objfs
//!
//! Every filesystem operation reports failures through [`Error`]. Store
//! clients translate their own failures into this taxonomy at the boundary.

use thiserror::Error;

/// Result type alias for objfs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the filesystem layer and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Path, object, bucket or filesystem does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target path already resolves to an object or directory
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Directory still has at least one child
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Copy/move option that this filesystem cannot honor
    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),

    /// Atomic moves are impossible on an object store
    #[error("Atomic move not supported: {source_path} -> {target_path}")]
    AtomicMoveUnsupported {
        source_path: String,
        target_path: String,
    },

    /// ACL evaluation or the store rejected the request
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or service failure that may succeed when retried
    #[error("Transient service error: {0}")]
    Transient(String),

    /// Path cannot be used for the requested operation
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Any other store failure, with the path it happened on
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl Error {
    /// Wrap an unmapped store failure with its path context
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error denotes a missing path
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::UnsupportedOption(_) | Error::AtomicMoveUnsupported { .. } => 2,
            Error::Transient(_) => 3,
            Error::AccessDenied(_) => 4,
            Error::NotFound(_) => 5,
            Error::AlreadyExists(_) | Error::DirectoryNotEmpty(_) => 6,
            Error::Config(_) | Error::Io { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("/bucket/key".to_string());
        assert_eq!(err.to_string(), "Not found: /bucket/key");

        let err = Error::io("/bucket/key", "boom");
        assert_eq!(err.to_string(), "I/O error on /bucket/key: boom");

        let err = Error::AtomicMoveUnsupported {
            source_path: "/b/a".to_string(),
            target_path: "/b/c".to_string(),
        };
        assert_eq!(err.to_string(), "Atomic move not supported: /b/a -> /b/c");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::NotFound(String::new()).exit_code(), 5);
        assert_eq!(Error::AccessDenied(String::new()).exit_code(), 4);
        assert_eq!(Error::DirectoryNotEmpty(String::new()).exit_code(), 6);
        assert_eq!(Error::Config(String::new()).exit_code(), 1);
    }
}
