//! Per-engine column type substitutions
//!
//! Some engines cannot store every semantic type natively. Rather than
//! patching the registry, the substitutions for one run are computed up front
//! and passed to the materializer, the coercion engine and the writer so all
//! three agree on the storage type of every column.

use std::collections::HashMap;

use super::{ColumnType, SchemaRegistry, TableSpec};
use crate::database::EngineCapabilities;

/// Storage type substitutions for one target engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeOverrides {
    /// table -> column -> storage type
    substitutions: HashMap<String, HashMap<String, ColumnType>>,
}

impl TypeOverrides {
    /// No substitutions; every column is stored as declared
    pub fn none() -> Self {
        Self::default()
    }

    /// Compute substitutions for every table in the registry
    pub fn for_engine(registry: &SchemaRegistry, capabilities: EngineCapabilities) -> Self {
        let mut overrides = Self::none();
        for table in registry.tables() {
            overrides.add_table(table, capabilities);
        }
        overrides
    }

    /// Compute substitutions for a single table
    pub fn for_table(table: &TableSpec, capabilities: EngineCapabilities) -> Self {
        let mut overrides = Self::none();
        overrides.add_table(table, capabilities);
        overrides
    }

    fn add_table(&mut self, table: &TableSpec, capabilities: EngineCapabilities) {
        for column in &table.columns {
            if let Some(storage) = substitute(column.column_type, capabilities) {
                tracing::debug!(
                    "Storing {}.{} as {} instead of {}",
                    table.name,
                    column.name,
                    storage,
                    column.column_type
                );
                self.substitutions
                    .entry(table.name.clone())
                    .or_default()
                    .insert(column.name.clone(), storage);
            }
        }
    }

    /// Storage type for a column, falling back to the declared type
    pub fn storage_type(&self, table: &str, column: &str, declared: ColumnType) -> ColumnType {
        self.substitutions
            .get(table)
            .and_then(|columns| columns.get(column))
            .copied()
            .unwrap_or(declared)
    }

    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Number of substituted columns across all tables
    pub fn len(&self) -> usize {
        self.substitutions.values().map(HashMap::len).sum()
    }
}

/// Nearest supported type for a column type the engine cannot store
fn substitute(column_type: ColumnType, capabilities: EngineCapabilities) -> Option<ColumnType> {
    match column_type {
        ColumnType::Bit if !capabilities.native_bit => Some(ColumnType::Integer),
        ColumnType::StringArray if !capabilities.native_array => Some(ColumnType::Text),
        _ => None,
    }
}
