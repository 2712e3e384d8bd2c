//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use registry_codes::{
    CoercedRow, DatabaseError, DatabaseResult, EngineCapabilities, SchemaRegistry,
    StorageBackend, StorageColumn, TableDefinition, TableRef,
};

/// Registry used by most pipeline tests
pub const TEST_REGISTRY: &str = r#"
tables:
  - name: facility
    columns:
      - { name: code, type: text }
      - { name: paediatric, type: boolean }
      - { name: exclusions, type: string_array }
      - { name: created, type: timestamp }
    excluded_columns: [created]
    unique_key: [code]
    dependencies: [code_list]

  - name: code_list
    columns:
      - { name: coding_standard, type: text }
      - { name: code, type: text }
      - { name: rank, type: integer }
    unique_key: [coding_standard, code]

  - name: modality
    columns:
      - { name: code, type: text }
      - { name: acute, type: bit }
      - { name: weight, type: decimal }
    unique_key: [code]
"#;

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_yaml(TEST_REGISTRY).unwrap()
}

/// Write one CSV fragment for a table
pub fn write_fragment(tables_dir: &Path, table: &str, file: &str, content: &str) {
    let dir = tables_dir.join(table);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), content).unwrap();
}

/// `count` rows of `code_list` CSV
pub fn code_list_csv(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("ICD10,{}{},{}\n", prefix, i, i))
        .collect()
}

#[derive(Default)]
pub struct State {
    /// Rows by qualified table name
    pub tables: HashMap<String, Vec<CoercedRow>>,
    /// Every storage call, in order
    pub calls: Vec<String>,
    /// Number of `insert_chunk` calls so far
    pub insert_calls: usize,
    /// Fail the n-th `insert_chunk` call (1-based)
    pub fail_insert_call: Option<usize>,
}

/// In-memory backend that records calls and can fail on demand
pub struct ScriptedBackend {
    pub state: Mutex<State>,
    capabilities: EngineCapabilities,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::with_capabilities(EngineCapabilities::default())
    }

    pub fn with_capabilities(capabilities: EngineCapabilities) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capabilities,
        }
    }

    pub fn fail_insert_call(&self, call: usize) {
        self.state.lock().unwrap().fail_insert_call = Some(call);
    }

    pub fn rows(&self, table: &str) -> Vec<CoercedRow> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait(?Send)]
impl StorageBackend for ScriptedBackend {
    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    async fn has_table(&self, table: &TableRef) -> DatabaseResult<bool> {
        self.record(format!("has_table {}", table));
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .contains_key(&table.to_string()))
    }

    async fn create_table(&self, definition: &TableDefinition) -> DatabaseResult<()> {
        self.record(format!("create_table {}", definition.table));
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(definition.table.to_string())
            .or_default();
        Ok(())
    }

    async fn create_schema(&self, schema: &str) -> DatabaseResult<()> {
        self.record(format!("create_schema {}", schema));
        Ok(())
    }

    async fn grant_schema(&self, schema: &str, role: &str) -> DatabaseResult<()> {
        self.record(format!("grant_schema {} {}", schema, role));
        Ok(())
    }

    async fn delete_all(&self, table: &TableRef) -> DatabaseResult<u64> {
        self.record(format!("delete_all {}", table));
        let mut state = self.state.lock().unwrap();
        let rows = state
            .tables
            .get_mut(&table.to_string())
            .ok_or_else(|| DatabaseError::QueryFailed(format!("no table {}", table)))?;
        let deleted = rows.len() as u64;
        rows.clear();
        Ok(deleted)
    }

    async fn insert_chunk(
        &self,
        table: &TableRef,
        columns: &[StorageColumn],
        rows: &[CoercedRow],
    ) -> DatabaseResult<u64> {
        self.record(format!("insert_chunk {} {}", table, rows.len()));
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        if state.fail_insert_call == Some(state.insert_calls) {
            return Err(DatabaseError::QueryFailed(
                "injected insert failure".to_string(),
            ));
        }
        if rows.iter().any(|row| row.len() != columns.len()) {
            return Err(DatabaseError::InvalidInput("row width mismatch".to_string()));
        }
        let stored = state
            .tables
            .get_mut(&table.to_string())
            .ok_or_else(|| DatabaseError::QueryFailed(format!("no table {}", table)))?;
        stored.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn count_rows(&self, table: &TableRef) -> DatabaseResult<u64> {
        self.record(format!("count_rows {}", table));
        Ok(self.rows(&table.to_string()).len() as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(true)
    }

    fn backend_type(&self) -> &'static str {
        "scripted"
    }

    async fn close(&self) -> DatabaseResult<()> {
        Ok(())
    }
}
