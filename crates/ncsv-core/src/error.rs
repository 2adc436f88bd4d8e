//! Error types for CSV normalization.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a normalization run.
///
/// Per-line read failures and field-count mismatches are not represented here:
/// the former are logged and skipped by the reader, the latter are corrected
/// and written to the mismatch log.
#[derive(Debug, Error)]
pub enum NormalizeError {
    // === Setup Errors ===
    /// Input file could not be opened.
    #[error("failed to open input {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// First record could not be read as a header.
    #[error("failed to read header from {path}: {source}")]
    HeaderRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Input has no records and no explicit header was given.
    #[error("input is empty and no header was supplied: {path}")]
    EmptyInput { path: PathBuf },

    /// An option value is out of range.
    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    // === Output Errors ===
    /// Output file could not be created.
    #[error("failed to create output file {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mismatch log could not be created.
    #[error("failed to create mismatch log {path}: {source}")]
    CreateMismatchLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to an output or log file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Runtime Errors ===
    /// The input stream failed mid-run.
    #[error("failed to read input after line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },

    /// A pipeline thread could not be started.
    #[error("failed to start {stage} thread: {source}")]
    SpawnThread {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline thread panicked.
    #[error("pipeline stage '{stage}' panicked")]
    StagePanicked { stage: &'static str },
}

impl NormalizeError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Result type for normalization operations.
pub type Result<T> = std::result::Result<T, NormalizeError>;
