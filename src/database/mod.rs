//! Storage backend abstraction
//!
//! The pipeline writes through the [`StorageBackend`] trait, which supports:
//! - DuckDB: embedded database, file based or in-memory
//! - PostgreSQL: server target with schemas and grants
//!
//! Backends report their [`EngineCapabilities`] so column types they cannot
//! store natively are substituted before tables are created.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::coerce::CoercedRow;
use crate::config::{DatabaseBackendType, LoaderConfig};
use crate::registry::ColumnType;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use schema::SqlDialect;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for storage operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// What a storage engine can represent natively
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    /// Single-bit column type
    pub native_bit: bool,
    /// Array of text column type
    pub native_array: bool,
    /// Named schemas (namespaces) for tables
    pub schemas: bool,
    /// Schema-level grants to roles
    pub grants: bool,
}

/// A possibly schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub schema: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    pub fn in_schema(name: impl Into<String>, schema: Option<&str>) -> Self {
        Self {
            name: name.into(),
            schema: schema.map(str::to_string),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A column with its effective storage type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageColumn {
    pub name: String,
    pub column_type: ColumnType,
}

impl StorageColumn {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Everything needed to create a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub table: TableRef,
    pub columns: Vec<StorageColumn>,
}

/// Storage backend trait used by the load pipeline
///
/// All operations are async so the PostgreSQL client can be driven directly.
/// The pipeline awaits every call in order; no two calls overlap.
#[async_trait(?Send)]
pub trait StorageBackend: Send + Sync {
    /// Column types and features the engine supports
    fn capabilities(&self) -> EngineCapabilities;

    /// Check whether a table exists
    async fn has_table(&self, table: &TableRef) -> DatabaseResult<bool>;

    /// Create a table with the given columns
    async fn create_table(&self, definition: &TableDefinition) -> DatabaseResult<()>;

    /// Create a schema if it does not exist
    async fn create_schema(&self, schema: &str) -> DatabaseResult<()>;

    /// Grant read access on a schema and its tables to a role
    async fn grant_schema(&self, schema: &str, role: &str) -> DatabaseResult<()>;

    /// Delete every row of a table in its own committed transaction
    ///
    /// # Returns
    /// Number of rows deleted
    async fn delete_all(&self, table: &TableRef) -> DatabaseResult<u64>;

    /// Insert rows in a single transaction
    ///
    /// On any error the transaction is rolled back and no row of the chunk
    /// remains.
    ///
    /// # Returns
    /// Number of rows inserted
    async fn insert_chunk(
        &self,
        table: &TableRef,
        columns: &[StorageColumn],
        rows: &[CoercedRow],
    ) -> DatabaseResult<u64>;

    /// Count rows in a table
    async fn count_rows(&self, table: &TableRef) -> DatabaseResult<u64>;

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool>;

    /// Backend type string ("duckdb" or "postgres")
    fn backend_type(&self) -> &'static str;

    /// Close the database connection
    async fn close(&self) -> DatabaseResult<()>;
}

/// Open the backend selected by the configuration
///
/// # Errors
/// Returns [`DatabaseError::ConfigError`] if the selected backend was not
/// compiled in, or a connection error if it cannot be opened.
pub async fn connect(config: &LoaderConfig) -> DatabaseResult<Box<dyn StorageBackend>> {
    match config.database.backend {
        DatabaseBackendType::DuckDB => connect_duckdb(config),
        DatabaseBackendType::Postgres => connect_postgres(config).await,
    }
}

#[cfg(feature = "duckdb-backend")]
fn connect_duckdb(config: &LoaderConfig) -> DatabaseResult<Box<dyn StorageBackend>> {
    let backend = if config.database.path == ":memory:" {
        DuckDBBackend::in_memory()?
    } else {
        DuckDBBackend::new(&config.database.path)?
    };
    Ok(Box::new(backend))
}

#[cfg(not(feature = "duckdb-backend"))]
fn connect_duckdb(_config: &LoaderConfig) -> DatabaseResult<Box<dyn StorageBackend>> {
    Err(DatabaseError::ConfigError(
        "DuckDB backend not enabled. Rebuild with --features duckdb-backend".to_string(),
    ))
}

#[cfg(feature = "postgres-backend")]
async fn connect_postgres(config: &LoaderConfig) -> DatabaseResult<Box<dyn StorageBackend>> {
    let backend = PostgresBackend::new(&config.postgres_url()).await?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "postgres-backend"))]
async fn connect_postgres(_config: &LoaderConfig) -> DatabaseResult<Box<dyn StorageBackend>> {
    Err(DatabaseError::ConfigError(
        "PostgreSQL backend not enabled. Rebuild with --features postgres-backend".to_string(),
    ))
}
