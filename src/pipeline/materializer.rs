//! Table creation
//!
//! Tables are created from the registry with engine column types, after any
//! per-engine substitutions. An existing table is left as it is; its shape is
//! not compared with the registry.

use serde::{Deserialize, Serialize};

use crate::database::{StorageBackend, StorageColumn, TableDefinition, TableRef};
use crate::error::{PipelineError, PipelineResult};
use crate::registry::{TableSpec, TypeOverrides};

/// Whether `ensure_table` had to create the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Created,
    Existing,
}

/// Ensures registry tables exist in the target
pub struct TableMaterializer<'a> {
    backend: &'a dyn StorageBackend,
    overrides: &'a TypeOverrides,
    schema: Option<String>,
}

impl<'a> TableMaterializer<'a> {
    /// # Errors
    /// A schema on an engine without schemas is a configuration error.
    pub fn new(
        backend: &'a dyn StorageBackend,
        overrides: &'a TypeOverrides,
        schema: Option<&str>,
    ) -> PipelineResult<Self> {
        if schema.is_some() && !backend.capabilities().schemas {
            return Err(PipelineError::Config(format!(
                "The {} backend does not support schemas",
                backend.backend_type()
            )));
        }

        Ok(Self {
            backend,
            overrides,
            schema: schema.map(str::to_string),
        })
    }

    /// Reference to a table in the configured schema
    pub fn table_ref(&self, table: &str) -> TableRef {
        TableRef::in_schema(table, self.schema.as_deref())
    }

    /// Storage definition of a table, including its excluded columns
    pub fn table_definition(&self, spec: &TableSpec) -> TableDefinition {
        let columns = spec
            .columns
            .iter()
            .map(|c| {
                StorageColumn::new(
                    c.name.clone(),
                    self.overrides
                        .storage_type(&spec.name, &c.name, c.column_type),
                )
            })
            .collect();

        TableDefinition {
            table: self.table_ref(&spec.name),
            columns,
        }
    }

    /// Create the table if it does not already exist
    pub async fn ensure_table(&self, spec: &TableSpec) -> PipelineResult<TableStatus> {
        let definition = self.table_definition(spec);

        if self.backend.has_table(&definition.table).await? {
            tracing::info!("Table already exists: {}", definition.table);
            return Ok(TableStatus::Existing);
        }

        self.backend.create_table(&definition).await?;
        tracing::info!("Created table: {}", definition.table);
        Ok(TableStatus::Created)
    }
}
