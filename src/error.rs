//! Storage error taxonomy
//!
//! Every backend failure is normalized into [`StorageError`] before it reaches
//! a consumer. Reads swallow these into empty values; writes surface them.

use std::io;

use crate::drive::DriveError;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored record is not a valid JSON object
    #[error("Malformed record {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The OS refused access
    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Any other local I/O failure (device full, read-only fs, ...)
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Remote API failure
    #[error("Drive request failed: {0}")]
    Transport(#[from] DriveError),

    /// A segment of a remote folder path does not exist
    #[error("Folder not found: {path} (missing: {missing})")]
    FolderNotFound { path: String, missing: String },

    /// Path escapes its root or is otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Backend cannot be constructed (credentials, drive, roots)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Classify an I/O error raised while touching `path`
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path),
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { path, source: err },
            _ => StorageError::Io { path, source: err },
        }
    }

    /// Whether this error means "nothing there" rather than a fault
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) | StorageError::FolderNotFound { .. } => true,
            StorageError::Transport(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let err = StorageError::from_io("a.json", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, StorageError::NotFound(p) if p == "a.json"));

        let err = StorageError::from_io("a.json", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, StorageError::PermissionDenied { .. }));

        let err = StorageError::from_io("a.json", io::Error::other("disk full"));
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_not_found_family() {
        assert!(StorageError::NotFound("x".into()).is_not_found());
        assert!(StorageError::FolderNotFound {
            path: "a/b".into(),
            missing: "b".into()
        }
        .is_not_found());
        assert!(StorageError::Transport(DriveError::NotFound(String::new())).is_not_found());
        assert!(!StorageError::Transport(DriveError::Timeout).is_not_found());
        assert!(!StorageError::InvalidPath("..".into()).is_not_found());
    }

    #[test]
    fn test_folder_not_found_names_segment() {
        let err = StorageError::FolderNotFound {
            path: "a/b/c".into(),
            missing: "c".into(),
        };
        assert_eq!(err.to_string(), "Folder not found: a/b/c (missing: c)");
    }
}
