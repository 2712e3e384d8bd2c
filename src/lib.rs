//! Registry Codes - batch loader for renal registry reference code tables
//!
//! Provides:
//! - A declarative schema registry (embedded YAML, overridable by path)
//! - CSV fragment loading, unique-key cleaning and type coercion
//! - Dependency-ordered, full-replace loads into DuckDB or PostgreSQL
//! - A `registry-codes` CLI (behind the `cli` feature)

pub mod coerce;
pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod registry;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use coerce::{CoercedRow, CoercedValue, CoercionOptions, TypeCoercer};
pub use config::LoaderConfig;
pub use database::{
    DatabaseError, DatabaseResult, EngineCapabilities, StorageBackend, StorageColumn,
    TableDefinition, TableRef,
};
pub use error::{PipelineError, PipelineResult};
pub use ingest::{CleanReport, DataCleaner, DataLoader, RowBuffer};
pub use pipeline::{
    BulkWriter, Pipeline, PipelineOptions, RunReport, TableMaterializer, TableOutcome,
    TableStatus,
};
pub use registry::{
    ColumnDef, ColumnType, DependencyResolver, SchemaRegistry, TableSpec, TypeOverrides,
};

#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresBackend;
