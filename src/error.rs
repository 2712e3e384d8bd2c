//! Pipeline error types
//!
//! Every stage of a table load reports failures through [`PipelineError`].
//! Configuration problems (unknown tables, a malformed registry, cyclic
//! dependencies) are fatal to the whole run; everything else is fatal only to
//! the table being loaded.

use std::path::PathBuf;

use crate::database::DatabaseError;
use crate::registry::ColumnType;

/// Error type for load pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Unknown table, malformed registry or invalid option
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dependency graph between tables contains a cycle
    #[error("Cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency {
        /// Tables forming the cycle, first and last entries are equal
        path: Vec<String>,
    },

    /// Source directory for a table is missing
    #[error("Table directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A source row does not have the expected number of fields
    #[error(
        "Malformed row in {}:{line}: expected {expected} fields, found {found}",
        file.display()
    )]
    MalformedRow {
        file: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A raw value could not be converted to its declared column type
    #[error("Cannot coerce {value:?} in {table}.{column} (row {row}) to {expected}: {reason}")]
    TypeCoercion {
        table: String,
        column: String,
        /// Zero-based row index within the cleaned buffer
        row: usize,
        value: String,
        expected: ColumnType,
        reason: String,
    },

    /// Storage engine failure (rolled back at chunk granularity)
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// CSV parsing failed
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error invalidates the whole run rather than a single table
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_) | PipelineError::CyclicDependency { .. }
        )
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
