//! Command line interface support
//!
//! Shared option handling for the `registry-codes` binary: building the
//! effective configuration from file, environment and flags, and picking the
//! tables a command applies to.

pub mod commands;
pub mod error;

use std::path::PathBuf;

use crate::config::{CONFIG_FILENAME, DatabaseBackendType, LoaderConfig};
use crate::registry::SchemaRegistry;
use error::CliError;

/// Options selecting the configuration and the load target
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILENAME)]
    pub config: PathBuf,
    /// Database backend (duckdb, postgres)
    #[arg(long)]
    pub backend: Option<DatabaseBackendType>,
    /// DuckDB database file, or ":memory:"
    #[arg(long, conflicts_with = "url")]
    pub database: Option<String>,
    /// PostgreSQL connection string
    #[arg(long)]
    pub url: Option<String>,
    /// Schema to load tables into
    #[arg(long)]
    pub schema: Option<String>,
    /// Directory with one sub-directory of CSV files per table
    #[arg(long)]
    pub tables_dir: Option<PathBuf>,
    /// Registry YAML file (defaults to the built-in registry)
    #[arg(long)]
    pub registry: Option<PathBuf>,
}

impl TargetArgs {
    /// Effective configuration: file, then environment, then flags
    pub fn resolve_config(&self) -> Result<LoaderConfig, CliError> {
        let mut config = LoaderConfig::load(&self.config)?;
        self.apply(&mut config);
        Ok(config)
    }

    /// Apply command line flags on top of a configuration
    pub fn apply(&self, config: &mut LoaderConfig) {
        if let Some(backend) = self.backend {
            config.database.backend = backend;
        }
        if let Some(path) = &self.database {
            config.database.backend = DatabaseBackendType::DuckDB;
            config.database.path = path.clone();
        }
        if let Some(url) = &self.url {
            config.database.backend = DatabaseBackendType::Postgres;
            config.postgres.connection_string = Some(url.clone());
        }
        if let Some(schema) = &self.schema {
            config.postgres.schema = Some(schema.clone());
        }
        if let Some(dir) = &self.tables_dir {
            config.load.tables_dir = dir.clone();
        }
        if let Some(registry) = &self.registry {
            config.load.registry = Some(registry.clone());
        }
    }
}

/// Which tables a command applies to
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TableSelection {
    /// Table to process (repeatable); all tables when omitted
    #[arg(long = "table")]
    pub tables: Vec<String>,
    /// Only process tables marked as large
    #[arg(long, conflicts_with_all = ["exclude_large_tables", "tables"])]
    pub large_tables: bool,
    /// Skip tables marked as large
    #[arg(long, conflicts_with = "tables")]
    pub exclude_large_tables: bool,
}

impl TableSelection {
    /// Table names to pass to the pipeline
    ///
    /// Every mode yields an explicit list. A large-table filter that matches
    /// nothing is an error rather than an empty selection.
    pub fn resolve(&self, registry: &SchemaRegistry) -> Result<Vec<String>, CliError> {
        if self.large_tables && self.exclude_large_tables {
            return Err(CliError::InvalidArgument(
                "--large-tables and --exclude-large-tables are mutually exclusive".to_string(),
            ));
        }
        if !self.tables.is_empty() && (self.large_tables || self.exclude_large_tables) {
            return Err(CliError::InvalidArgument(
                "--table cannot be combined with a large table filter".to_string(),
            ));
        }

        if self.large_tables {
            non_empty(registry.large_tables(), "No tables are marked as large")
        } else if self.exclude_large_tables {
            non_empty(registry.regular_tables(), "Every table is marked as large")
        } else if self.tables.is_empty() {
            Ok(registry.table_names())
        } else {
            Ok(self.tables.clone())
        }
    }
}

fn non_empty(tables: Vec<String>, reason: &str) -> Result<Vec<String>, CliError> {
    if tables.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "{}, nothing to select",
            reason
        )));
    }
    Ok(tables)
}

/// Registry from the configured file, or the built-in one
pub fn load_registry(config: &LoaderConfig) -> Result<SchemaRegistry, CliError> {
    let registry = match &config.load.registry {
        Some(path) => SchemaRegistry::load(path)?,
        None => SchemaRegistry::builtin()?,
    };
    Ok(registry)
}

/// Single-threaded runtime for driving the storage backends
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}
