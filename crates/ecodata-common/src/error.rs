//! Error types for the ecodata workspace

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ecodata operations
pub type Result<T> = std::result::Result<T, EcodataError>;

/// Main error type for ecodata
///
/// The `Network`, `Archive`, `Encoding`, and `Filesystem` variants mark the
/// failure domain of a single source acquisition; the pipeline reports them
/// per source without aborting the run. [`EcodataError::is_fatal`]
/// distinguishes failures that poison the whole run (e.g. the disk is full).
#[derive(Error, Debug)]
pub enum EcodataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Filesystem error at {path}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EcodataError {
    /// Wrap an I/O error with the path it occurred on
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EcodataError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error indicates a global resource failure that should
    /// abort the whole run rather than just the current source.
    pub fn is_fatal(&self) -> bool {
        match self {
            EcodataError::Io(e) => e.kind() == std::io::ErrorKind::StorageFull,
            EcodataError::Filesystem { source, .. } => {
                source.kind() == std::io::ErrorKind::StorageFull
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_is_not_fatal() {
        let err = EcodataError::Network("connection refused".to_string());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_storage_full_is_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::StorageFull, "no space left on device");
        assert!(EcodataError::Io(io).is_fatal());
    }

    #[test]
    fn test_filesystem_error_carries_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = EcodataError::filesystem("/data/ecotox_data", io);
        assert!(err.to_string().contains("ecotox_data"));
    }
}
