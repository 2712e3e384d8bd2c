//! CLI-specific error types

use thiserror::Error;

use crate::database::DatabaseError;
use crate::error::PipelineError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("{} table(s) failed: {}", .0.len(), .0.join(", "))]
    TablesFailed(Vec<String>),

    #[error("{0} problem(s) found in source files")]
    IncompleteData(usize),
}
