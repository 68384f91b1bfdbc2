//! Error types for sgfdb
//!
//! This module defines the error hierarchy for a database run:
//! - Storage errors (directory enumeration, file reads and writes)
//! - Record errors (parse and serialize failures from the record layer)
//! - Configuration and CLI errors
//! - Pipeline errors (channels, worker tasks)
//!
//! Errors inside one directory never abort the run. They are attached to the
//! directory's job and reported; only a failure to enumerate the index root
//! ends a run early.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for sgfdb
#[derive(Error, Debug)]
pub enum SgfDbError {
    /// Storage-layer errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record parse/serialize errors
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline/concurrency errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Storage capability errors
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Directory listing failed
    #[error("Failed to read directory '{path}': {reason}")]
    EnumerationFailed { path: PathBuf, reason: String },

    /// File read failed
    #[error("Failed to read file '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// File write failed
    #[error("Failed to write file '{path}': {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    /// Output directory could not be created
    #[error("Failed to create directory '{path}': {reason}")]
    CreateDirFailed { path: PathBuf, reason: String },

    /// Path not found
    #[error("Path not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Permission denied
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: PathBuf },
}

impl StorageError {
    /// Build an enumeration error from an I/O error, keeping the common kinds distinct
    pub fn enumeration(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { path },
            _ => StorageError::EnumerationFailed {
                path,
                reason: err.to_string(),
            },
        }
    }

    /// Build a read error from an I/O error
    pub fn read(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { path },
            _ => StorageError::ReadFailed {
                path,
                reason: err.to_string(),
            },
        }
    }

    /// Check if this error only affects a single entry (the rest of the run can go on)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. }
                | StorageError::PermissionDenied { .. }
                | StorageError::ReadFailed { .. }
                | StorageError::EnumerationFailed { .. }
        )
    }

    /// The path the failed operation was applied to
    pub fn path(&self) -> &std::path::Path {
        match self {
            StorageError::EnumerationFailed { path, .. }
            | StorageError::ReadFailed { path, .. }
            | StorageError::WriteFailed { path, .. }
            | StorageError::CreateDirFailed { path, .. }
            | StorageError::NotFound { path }
            | StorageError::PermissionDenied { path } => path,
        }
    }
}

/// Errors raised while parsing or serializing a record file
#[derive(Error, Debug, Clone)]
pub enum RecordError {
    /// One or more parse errors were reported for a file
    #[error("{count} parse error(s) in '{file}', first: {first}")]
    Parse {
        file: String,
        count: usize,
        first: String,
    },

    /// Writing the serialized record failed
    #[error("Failed to write '{file}': {source}")]
    Write {
        file: String,
        #[source]
        source: StorageError,
    },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid concurrency limit
    #[error("Invalid max concurrency {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },

    /// Invalid line width
    #[error("Invalid line width {width}: must be at least 1")]
    InvalidLineWidth { width: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// The selected action needs an output root
    #[error("The '{action}' action requires an output directory (--output)")]
    MissingOutputRoot { action: &'static str },

    /// Output root is unusable
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Directory worker task panicked
    #[error("Worker for job {ordinal} panicked: {message}")]
    WorkerPanicked { ordinal: usize, message: String },

    /// Job queue closed before the run was sealed
    #[error("Job queue closed unexpectedly")]
    QueueClosed,

    /// Aggregator stopped before signalling completion
    #[error("Aggregator stopped before signalling completion")]
    AggregatorStopped,

    /// Availability semaphore was closed
    #[error("Availability semaphore closed")]
    SemaphoreClosed,

    /// A pipeline task ended abnormally
    #[error("{task} task failed: {message}")]
    TaskFailed { task: &'static str, message: String },
}

/// Result type alias for SgfDbError
pub type Result<T> = std::result::Result<T, SgfDbError>;

/// Result type alias for StorageError
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let storage = StorageError::enumeration("/db/1980", &err);
        assert!(matches!(storage, StorageError::NotFound { .. }));
        assert!(storage.is_recoverable());
        assert_eq!(storage.path(), std::path::Path::new("/db/1980"));

        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let storage = StorageError::read("/db/1980/a.sgf", &err);
        assert!(matches!(storage, StorageError::ReadFailed { .. }));
    }

    #[test]
    fn test_write_errors_are_not_recoverable() {
        let err = StorageError::WriteFailed {
            path: "/out/a.sgf".into(),
            reason: "read-only filesystem".into(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let storage = StorageError::NotFound {
            path: "/missing".into(),
        };
        let top: SgfDbError = storage.into();
        assert!(matches!(top, SgfDbError::Storage(_)));
    }
}
