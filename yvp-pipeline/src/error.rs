//! Error types for yvp-pipeline
//!
//! Source errors are fatal to the stage that raised them and mark the run
//! `failed`. Per-record problems (join misses, bad geometry) are counted in
//! stage reports instead of surfacing here.

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// yvp-common error (config, geometry, store)
    #[error(transparent)]
    Common(#[from] yvp_common::Error),

    /// Database error raised directly by a stage query
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Raw extract could not be read or lacks a required column
    #[error("Source '{source_name}' failed: {message}")]
    Source { source_name: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ledger transition out of a terminal state
    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A stage aborted for a reason not covered above
    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    /// Build a [`PipelineError::Source`] naming the offending source
    pub fn source_failure(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn stage_failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
