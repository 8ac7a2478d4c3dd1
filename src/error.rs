//! Failure taxonomy of an ingestion run.
//!
//! Every stage returns `anyhow` errors with context; the pipeline boundary
//! classifies them into [`IngestError`], which knows its HTTP status and how
//! to render itself as an error body.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::REQUIRED_VARS;

#[derive(Debug, Error)]
pub enum IngestError {
    /// One or more required environment variables are unset or empty.
    #[error(
        "Missing environment variables: {} (required: {})",
        .missing.join(", "),
        REQUIRED_VARS.join(", ")
    )]
    ConfigMissing { missing: Vec<&'static str> },

    /// The fetcher returned something that is not a directory.
    #[error("Dataset path not found: {}", .path.display())]
    DatasetUnavailable { path: PathBuf },

    /// The dataset directory holds no `.csv` files.
    #[error("No CSV files found in dataset")]
    NoInputFiles,

    /// Connect or probe query failed.
    #[error("Database connection failed: {0:#}")]
    ConnectionFailed(#[source] anyhow::Error),

    /// Reading, creating or inserting one file failed; the run stopped there.
    #[error("Failed to process {file}: {source:#}")]
    FileProcessingFailed {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    /// Anything else.
    #[error("Failed: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl IngestError {
    /// HTTP status for this failure: caller/environment problems are 400,
    /// failures during the load itself are 500.
    pub fn status(&self) -> u16 {
        match self {
            IngestError::ConfigMissing { .. }
            | IngestError::DatasetUnavailable { .. }
            | IngestError::NoInputFiles
            | IngestError::ConnectionFailed(_) => 400,
            IngestError::FileProcessingFailed { .. } | IngestError::Unexpected(_) => 500,
        }
    }

    /// Diagnostic trace attached to the error body, if any.
    pub fn details(&self) -> Option<String> {
        match self {
            IngestError::FileProcessingFailed { source, .. } => Some(format!("{:?}", source)),
            _ => None,
        }
    }
}
