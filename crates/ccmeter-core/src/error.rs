//! Error types for ccmeter-core
//!
//! Structural failures surface as [`CoreError`]; recoverable per-file problems
//! are collected in a [`LoadReport`] so one bad file never fails a load.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for ccmeter operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // IO Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("No readable data directory among: {}", format_paths(.searched))]
    NoDataRoots { searched: Vec<PathBuf> },

    // ===================
    // Watch Errors
    // ===================
    #[error("File watcher error: {message}")]
    WatchError {
        message: String,
        #[source]
        source: Option<notify::Error>,
    },

    // ===================
    // Runtime Errors
    // ===================
    #[error("Background task failed during {phase}")]
    TaskFailed {
        phase: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(none)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CoreError {
    /// Map an io::Error on `path` to the matching variant
    pub fn from_io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        let path = path.into();
        if error.kind() == std::io::ErrorKind::NotFound {
            CoreError::FileNotFound { path }
        } else {
            CoreError::FileRead {
                path,
                source: error,
            }
        }
    }
}

/// Severity level for errors during load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical, can continue with degraded functionality
    Warning,
    /// The file could not be read at all
    Error,
}

/// Individual error entry in load report
#[derive(Debug, Clone)]
pub struct LoadError {
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl LoadError {
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Warning,
        }
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Error,
        }
    }
}

/// Report of what one ingestion pass did
///
/// Tracks partial failures instead of failing the whole load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub errors: Vec<LoadError>,
    /// Candidate files discovered under all roots
    pub files_discovered: usize,
    /// Files whose mtime changed and were re-read
    pub files_read: usize,
    /// Files skipped for this poll because reading failed
    pub files_failed: usize,
    /// New records ingested
    pub records_added: usize,
    /// Lines rejected by the dedup filter
    pub duplicates_skipped: usize,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: LoadError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns (warnings, errors)
    pub fn error_count(&self) -> (usize, usize) {
        let count = |severity| {
            self.errors
                .iter()
                .filter(|e| e.severity == severity)
                .count()
        };
        (count(ErrorSeverity::Warning), count(ErrorSeverity::Error))
    }

    /// Merge a later pass over the same roots into this one
    ///
    /// Both passes discover the same candidates, so `files_discovered`
    /// keeps the larger count instead of adding.
    pub fn merge(&mut self, other: LoadReport) {
        self.errors.extend(other.errors);
        self.files_discovered = self.files_discovered.max(other.files_discovered);
        self.files_read += other.files_read;
        self.files_failed += other.files_failed;
        self.records_added += other.records_added;
        self.duplicates_skipped += other.duplicates_skipped;
    }
}
