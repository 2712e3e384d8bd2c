//! SQL generation for the supported engines
//!
//! Identifiers are always quoted so registry column names never collide with
//! keywords. Values are never interpolated into SQL; inserts use placeholders.

use super::{StorageColumn, TableDefinition, TableRef};
use crate::registry::ColumnType;

/// SQL flavour of a storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    DuckDB,
    Postgres,
}

impl SqlDialect {
    /// Quote an identifier, doubling embedded quotes
    pub fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quoted, optionally schema-qualified table name
    pub fn qualified_name(table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                Self::quote_ident(schema),
                Self::quote_ident(&table.name)
            ),
            None => Self::quote_ident(&table.name),
        }
    }

    /// Engine column type for a storage type
    pub fn column_sql_type(self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (_, ColumnType::Text) => "TEXT",
            (_, ColumnType::Integer) => "BIGINT",
            (_, ColumnType::Decimal) => "DOUBLE PRECISION",
            (_, ColumnType::Boolean) => "BOOLEAN",
            (_, ColumnType::Timestamp) => "TIMESTAMP",
            (SqlDialect::Postgres, ColumnType::StringArray) => "TEXT[]",
            (SqlDialect::DuckDB, ColumnType::StringArray) => "VARCHAR[]",
            (SqlDialect::Postgres, ColumnType::Bit) => "BIT(1)",
            (SqlDialect::DuckDB, ColumnType::Bit) => "BIT",
        }
    }

    pub fn create_table_sql(self, definition: &TableDefinition) -> String {
        let columns: Vec<String> = definition
            .columns
            .iter()
            .map(|c| {
                format!(
                    "    {} {}",
                    Self::quote_ident(&c.name),
                    self.column_sql_type(c.column_type)
                )
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            Self::qualified_name(&definition.table),
            columns.join(",\n")
        )
    }

    pub fn delete_all_sql(table: &TableRef) -> String {
        format!("DELETE FROM {}", Self::qualified_name(table))
    }

    pub fn count_sql(table: &TableRef) -> String {
        format!("SELECT COUNT(*) FROM {}", Self::qualified_name(table))
    }

    /// Query taking the table name and optional schema as parameters
    ///
    /// Without a schema the engine's current schema is searched.
    pub fn has_table_sql(self) -> &'static str {
        match self {
            SqlDialect::DuckDB => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_name = ? AND table_schema = COALESCE(CAST(? AS VARCHAR), current_schema())"
            }
            SqlDialect::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_name = $1::TEXT AND table_schema = COALESCE($2::TEXT, current_schema())"
            }
        }
    }

    /// Placeholder for the parameter at one-based `index`
    ///
    /// PostgreSQL placeholders carry a cast so typed nulls and bit values bind
    /// without relying on type inference.
    pub fn placeholder(self, index: usize, column_type: ColumnType) -> String {
        match self {
            SqlDialect::DuckDB => "?".to_string(),
            SqlDialect::Postgres => match column_type {
                ColumnType::Bit => format!("${}::INTEGER::BIT(1)", index),
                other => format!("${}::{}", index, self.column_sql_type(other)),
            },
        }
    }

    /// Single-row insert statement for the given columns
    pub fn insert_sql(self, table: &TableRef, columns: &[StorageColumn]) -> String {
        let names: Vec<String> = columns.iter().map(|c| Self::quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| self.placeholder(i + 1, c.column_type))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::qualified_name(table),
            names.join(", "),
            placeholders.join(", ")
        )
    }

    pub fn create_schema_sql(schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", Self::quote_ident(schema))
    }

    /// Statements giving `role` read access to everything in `schema`
    pub fn grant_sql(schema: &str, role: &str) -> Vec<String> {
        let schema = Self::quote_ident(schema);
        let role = Self::quote_ident(role);
        vec![
            format!("GRANT USAGE ON SCHEMA {} TO {}", schema, role),
            format!("GRANT SELECT ON ALL TABLES IN SCHEMA {} TO {}", schema, role),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {} GRANT SELECT ON TABLES TO {}",
                schema, role
            ),
        ]
    }
}
