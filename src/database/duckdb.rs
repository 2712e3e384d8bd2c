//! DuckDB database backend implementation
//!
//! Provides an embedded target for registry code tables, either file based or
//! in-memory. DuckDB cannot bind bit or list parameters, so those columns are
//! stored as integer and JSON text.

use async_trait::async_trait;
use duckdb::params_from_iter;
use duckdb::types::{TimeUnit, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::SqlDialect;
use super::{
    DatabaseError, DatabaseResult, EngineCapabilities, StorageBackend, StorageColumn,
    TableDefinition, TableRef,
};
use crate::coerce::{CoercedRow, CoercedValue};

/// DuckDB database backend
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    ///
    /// Useful for testing and dry runs where persistence is not needed.
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Execute a SQL statement that doesn't return rows
    fn execute(&self, sql: &str) -> DatabaseResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    /// Convert a coerced value to a DuckDB parameter
    fn to_value(value: &CoercedValue) -> Value {
        match value {
            CoercedValue::Null => Value::Null,
            CoercedValue::Text(s) => Value::Text(s.clone()),
            CoercedValue::Integer(i) => Value::BigInt(*i),
            CoercedValue::Decimal(f) => Value::Double(*f),
            CoercedValue::Boolean(b) => Value::Boolean(*b),
            CoercedValue::Timestamp(ts) => {
                Value::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
            }
            CoercedValue::TextArray(items) => {
                Value::Text(serde_json::Value::from(items.clone()).to_string())
            }
        }
    }
}

/// Insert rows with one prepared statement
fn insert_rows(conn: &duckdb::Connection, sql: &str, rows: &[CoercedRow]) -> duckdb::Result<u64> {
    let mut stmt = conn.prepare(sql)?;
    let mut inserted = 0u64;
    for row in rows {
        inserted += stmt.execute(params_from_iter(row.iter().map(DuckDBBackend::to_value)))? as u64;
    }
    Ok(inserted)
}

#[async_trait(?Send)]
impl StorageBackend for DuckDBBackend {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            native_bit: false,
            native_array: false,
            schemas: true,
            grants: false,
        }
    }

    async fn has_table(&self, table: &TableRef) -> DatabaseResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                SqlDialect::DuckDB.has_table_sql(),
                duckdb::params![table.name, table.schema],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Table lookup failed: {}", e)))?;
        Ok(count > 0)
    }

    async fn create_table(&self, definition: &TableDefinition) -> DatabaseResult<()> {
        self.execute(&SqlDialect::DuckDB.create_table_sql(definition))?;
        Ok(())
    }

    async fn create_schema(&self, schema: &str) -> DatabaseResult<()> {
        self.execute(&SqlDialect::create_schema_sql(schema))?;
        Ok(())
    }

    async fn grant_schema(&self, schema: &str, role: &str) -> DatabaseResult<()> {
        Err(DatabaseError::InvalidInput(format!(
            "DuckDB does not support grants (schema {}, role {})",
            schema, role
        )))
    }

    async fn delete_all(&self, table: &TableRef) -> DatabaseResult<u64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to start transaction: {}", e))
        })?;

        let deleted = match tx.execute(&SqlDialect::delete_all_sql(table), []) {
            Ok(deleted) => deleted as u64,
            Err(e) => {
                let _ = tx.rollback();
                return Err(DatabaseError::QueryFailed(format!(
                    "Failed to delete rows from {}: {}",
                    table, e
                )));
            }
        };

        tx.commit().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to commit delete: {}", e))
        })?;
        Ok(deleted)
    }

    async fn insert_chunk(
        &self,
        table: &TableRef,
        columns: &[StorageColumn],
        rows: &[CoercedRow],
    ) -> DatabaseResult<u64> {
        let sql = SqlDialect::DuckDB.insert_sql(table, columns);
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to start transaction: {}", e))
        })?;

        match insert_rows(&tx, &sql, rows) {
            Ok(inserted) => {
                tx.commit().map_err(|e| {
                    DatabaseError::TransactionFailed(format!("Failed to commit chunk: {}", e))
                })?;
                Ok(inserted)
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(DatabaseError::QueryFailed(format!(
                    "Insert into {} failed: {}",
                    table, e
                )))
            }
        }
    }

    async fn count_rows(&self, table: &TableRef) -> DatabaseResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&SqlDialect::count_sql(table), [], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let conn = self.lock()?;
        let value: i32 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(format!("Health check failed: {}", e)))?;
        Ok(value == 1)
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // DuckDB connection is closed when dropped
        Ok(())
    }
}
