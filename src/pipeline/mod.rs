//! Load pipeline orchestration
//!
//! A run resolves the table order once, then processes one table at a time:
//! load the CSV fragments, clean them, coerce every row, make sure the table
//! exists and finally replace its contents. A failed table is recorded in
//! the [`RunReport`] and the run moves on to the next one.

mod materializer;
mod writer;

pub use materializer::{TableMaterializer, TableStatus};
pub use writer::{BulkWriter, DEFAULT_CHUNK_SIZE};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::coerce::{CoercionOptions, TypeCoercer};
use crate::config::LoaderConfig;
use crate::database::StorageBackend;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{CleanReport, DataCleaner, DataLoader};
use crate::registry::{DependencyResolver, SchemaRegistry, TypeOverrides};

/// Options for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Rows per insert transaction
    pub chunk_size: usize,
    /// Schema to create and load tables into
    pub schema: Option<String>,
    /// Role granted read access to the schema
    pub grant_role: Option<String>,
    pub coercion: CoercionOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            schema: None,
            grant_role: None,
            coercion: CoercionOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            chunk_size: config.load.chunk_size,
            schema: config.postgres.schema.clone(),
            grant_role: config.postgres.grant_role.clone(),
            coercion: config.coercion_options(),
        }
    }
}

/// What happened to one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TableOutcome {
    /// Rows were replaced
    Loaded {
        rows_written: u64,
        clean: CleanReport,
        table: TableStatus,
    },
    /// No source rows; existing rows were left untouched
    Empty { table: TableStatus },
    Failed { error: String },
}

impl TableOutcome {
    pub fn rows_written(&self) -> u64 {
        match self {
            TableOutcome::Loaded { rows_written, .. } => *rows_written,
            _ => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TableOutcome::Failed { .. })
    }
}

/// Outcome of one table in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub outcome: TableOutcome,
}

/// Per-table outcomes of a run, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn get(&self, table: &str) -> Option<&TableOutcome> {
        self.tables
            .iter()
            .find(|r| r.table == table)
            .map(|r| &r.outcome)
    }

    /// Rows written across all tables
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|r| r.outcome.rows_written()).sum()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|r| r.outcome.is_failure())
            .map(|r| r.table.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.tables.iter().all(|r| !r.outcome.is_failure())
    }
}

/// Loads registry tables from CSV into a storage backend
pub struct Pipeline<'a> {
    registry: &'a SchemaRegistry,
    backend: &'a dyn StorageBackend,
    loader: DataLoader<'a>,
    cleaner: DataCleaner<'a>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        backend: &'a dyn StorageBackend,
        tables_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            backend,
            loader: DataLoader::new(registry, tables_dir),
            cleaner: DataCleaner::new(registry),
            options,
        }
    }

    /// Resolve the load order for `tables`, or for every table when empty
    ///
    /// # Errors
    /// Unknown tables and dependency cycles are configuration errors.
    pub fn plan(&self, tables: &[String]) -> PipelineResult<Vec<String>> {
        let resolver = DependencyResolver::new(self.registry.tables());
        if tables.is_empty() {
            resolver.resolve()
        } else {
            resolver.order_subset(tables)
        }
    }

    /// Reject option combinations the backend cannot honour
    fn check_options(&self) -> PipelineResult<()> {
        let capabilities = self.backend.capabilities();
        let backend = self.backend.backend_type();

        if self.options.chunk_size == 0 {
            return Err(PipelineError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.options.schema.is_some() && !capabilities.schemas {
            return Err(PipelineError::Config(format!(
                "The {} backend does not support schemas",
                backend
            )));
        }
        if self.options.grant_role.is_some() {
            if self.options.schema.is_none() {
                return Err(PipelineError::Config(
                    "A grant role requires a schema".to_string(),
                ));
            }
            if !capabilities.grants {
                return Err(PipelineError::Config(format!(
                    "The {} backend does not support grants",
                    backend
                )));
            }
        }
        Ok(())
    }

    /// Create the target schema and grant it, when configured
    pub async fn prepare_namespace(&self) -> PipelineResult<()> {
        let Some(schema) = &self.options.schema else {
            return Ok(());
        };

        self.backend.create_schema(schema).await?;
        tracing::info!("Schema {} ready", schema);

        if let Some(role) = &self.options.grant_role {
            self.backend.grant_schema(schema, role).await?;
            tracing::info!("Granted {} read access to {}", role, schema);
        }
        Ok(())
    }

    /// Load `tables` (every table when empty) in dependency order
    ///
    /// # Errors
    /// Configuration errors abort the run before storage is touched, and a
    /// failure to prepare the schema aborts it before any table is loaded.
    /// Failures of individual tables are reported in the [`RunReport`].
    pub async fn run(&self, tables: &[String]) -> PipelineResult<RunReport> {
        self.check_options()?;
        let order = self.plan(tables)?;
        let overrides = TypeOverrides::for_engine(self.registry, self.backend.capabilities());

        tracing::info!(
            "Loading {} tables into {}: {}",
            order.len(),
            self.backend.backend_type(),
            order.join(", ")
        );
        self.prepare_namespace().await?;

        let mut report = RunReport::default();
        for table in order {
            let outcome = match self.load_table(&table, &overrides).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Failed to load {}: {}", table, e);
                    TableOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.tables.push(TableReport { table, outcome });
        }

        tracing::info!(
            "Run finished: {} rows written, {} tables failed",
            report.total_rows(),
            report.failed_tables().len()
        );
        Ok(report)
    }

    /// Load a single table
    ///
    /// Every row is coerced before the table is touched, so a bad value
    /// leaves the existing rows in place.
    pub async fn load_table(
        &self,
        table: &str,
        overrides: &TypeOverrides,
    ) -> PipelineResult<TableOutcome> {
        let spec = self.registry.get(table)?;
        tracing::info!("Loading {}", table);

        let buffer = self.loader.load(table)?;
        let (buffer, clean) = self.cleaner.clean(table, buffer)?;

        let coercer = TypeCoercer::new(spec, buffer.columns(), overrides, self.options.coercion)?;
        let rows = coercer.coerce_all(&buffer)?;

        let materializer =
            TableMaterializer::new(self.backend, overrides, self.options.schema.as_deref())?;
        let status = materializer.ensure_table(spec).await?;

        if rows.is_empty() {
            tracing::warn!("No rows to load into {}, existing rows kept", table);
            return Ok(TableOutcome::Empty { table: status });
        }

        let writer = BulkWriter::new(self.backend, self.options.chunk_size)?;
        let rows_written = writer
            .write(
                &materializer.table_ref(table),
                &coercer.storage_columns(),
                &rows,
            )
            .await?;
        tracing::info!("Inserted {} rows into {}", rows_written, table);

        Ok(TableOutcome::Loaded {
            rows_written,
            clean,
            table: status,
        })
    }

    /// Row count of each table in the target, `None` when it does not exist
    pub async fn row_counts(&self, tables: &[String]) -> PipelineResult<Vec<(String, Option<u64>)>> {
        let overrides = TypeOverrides::none();
        let materializer =
            TableMaterializer::new(self.backend, &overrides, self.options.schema.as_deref())?;

        let mut counts = Vec::new();
        for table in self.plan(tables)? {
            let table_ref = materializer.table_ref(&table);
            let count = if self.backend.has_table(&table_ref).await? {
                Some(self.backend.count_rows(&table_ref).await?)
            } else {
                None
            };
            counts.push((table, count));
        }
        Ok(counts)
    }
}
