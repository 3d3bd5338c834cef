//! Error types for the OPFS filesystem adapter.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::storage::StorageError;

/// Filesystem error type with contextual variants.
///
/// All error variants include relevant context (path, operation) where applicable.
/// Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use anyfs_opfs::FsError;
/// use std::path::PathBuf;
///
/// let err = FsError::NotFound { path: PathBuf::from("/missing") };
/// assert!(err.to_string().contains("/missing"));
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    // Path Errors
    /// A path segment or entry does not exist in the storage tree.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// The path has the wrong shape for the requested operation.
    #[error("invalid path: {path} ({reason})")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: &'static str,
    },

    // Session Errors
    /// Operation forbidden by the mode the file was opened with.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path of the session.
        path: PathBuf,
        /// The operation that was denied.
        operation: &'static str,
    },

    /// Operation attempted on a closed file.
    #[error("{operation}: file already closed: {path}")]
    Closed {
        /// The path of the closed session.
        path: PathBuf,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Byte I/O on a directory, or a listing on a regular file.
    #[error("{operation}: invalid operation: {path}")]
    InvalidOperation {
        /// The path of the session.
        path: PathBuf,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Seek target is not representable as a byte offset.
    #[error("invalid seek offset: {path}")]
    InvalidSeek {
        /// The path of the session.
        path: PathBuf,
    },

    /// The random-access handle for a file could not be created.
    ///
    /// Once acquisition failed, every later I/O call on the same session
    /// reports this error again.
    #[error("cannot acquire access handle for {path}: {reason}")]
    AccessHandle {
        /// The path of the session.
        path: PathBuf,
        /// The failure reported by the first acquisition attempt.
        reason: String,
    },

    // Backend/Operation Errors
    /// Operation has no equivalent in the underlying storage.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// A pending storage operation dropped both of its callbacks.
    #[error("storage operation never settled: {path}")]
    Unsettled {
        /// The path the operation was issued for.
        path: PathBuf,
    },

    /// Any other failure reported by the storage backend.
    #[error("backend error for {path}: {source}")]
    Backend {
        /// The path the operation was issued for.
        path: PathBuf,
        /// The error reported by the storage backend.
        #[source]
        source: StorageError,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Returns the backend error, if this error came from the storage backend.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            FsError::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => FsError::NotFound {
                path: PathBuf::new(),
            },
            ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path: PathBuf::new(),
                operation: "io",
            },
            _ => FsError::Io {
                operation: "io",
                path: PathBuf::new(),
                source: error,
            },
        }
    }
}

impl From<FsError> for std::io::Error {
    fn from(error: FsError) -> Self {
        let kind = match &error {
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            FsError::InvalidPath { .. } | FsError::InvalidSeek { .. } => ErrorKind::InvalidInput,
            FsError::NotSupported { .. } => ErrorKind::Unsupported,
            FsError::Io { source, .. } => source.kind(),
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageErrorKind;

    #[test]
    fn fs_error_not_found_display() {
        let err = FsError::NotFound {
            path: PathBuf::from("/missing"),
        };
        assert_eq!(err.to_string(), "not found: /missing");
    }

    #[test]
    fn fs_error_permission_denied_display() {
        let err = FsError::PermissionDenied {
            path: PathBuf::from("/notes.txt"),
            operation: "write",
        };
        assert_eq!(err.to_string(), "write: permission denied: /notes.txt");
    }

    #[test]
    fn fs_error_not_supported_display() {
        let err = FsError::NotSupported {
            operation: "rename",
        };
        assert_eq!(err.to_string(), "operation not supported: rename");
    }

    #[test]
    fn fs_error_backend_exposes_storage_error() {
        let err = FsError::Backend {
            path: PathBuf::from("/a"),
            source: StorageError::new(StorageErrorKind::TypeMismatch, "is a directory"),
        };
        assert_eq!(
            err.storage_error().map(StorageError::kind),
            Some(StorageErrorKind::TypeMismatch)
        );
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn fs_error_from_io_not_found() {
        let io_err = std::io::Error::new(ErrorKind::NotFound, "test");
        let fs_err = FsError::from(io_err);
        assert!(matches!(fs_err, FsError::NotFound { .. }));
    }

    #[test]
    fn fs_error_from_io_other() {
        let io_err = std::io::Error::new(ErrorKind::Other, "test");
        let fs_err = FsError::from(io_err);
        assert!(matches!(fs_err, FsError::Io { .. }));
    }

    #[test]
    fn io_error_from_fs_error_keeps_kind() {
        let io_err = std::io::Error::from(FsError::PermissionDenied {
            path: PathBuf::from("/x"),
            operation: "read",
        });
        assert_eq!(io_err.kind(), ErrorKind::PermissionDenied);

        let io_err = std::io::Error::from(FsError::NotSupported {
            operation: "chmod",
        });
        assert_eq!(io_err.kind(), ErrorKind::Unsupported);
    }
}
