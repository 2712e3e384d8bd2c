//! Schema registry
//!
//! Maps logical table names to the shape of the table in storage: ordered
//! columns with their semantic types, the columns filled in at load time, the
//! unique key used for cleaning, and the tables that must be loaded first.
//!
//! The registry is data, not code. A default copy covering the registry code
//! tables is embedded in the crate; an alternative YAML file can be supplied
//! at start-up. Either way it is loaded once and treated as read-only.

mod overrides;
mod resolver;

pub use overrides::TypeOverrides;
pub use resolver::DependencyResolver;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Registry definition embedded in the binary
const BUILTIN_REGISTRY: &str = include_str!("tables.yaml");

/// Semantic column type
///
/// Closed set of types a registry column may declare. Coercion, DDL
/// generation and parameter binding all match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
    StringArray,
    Bit,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Decimal => write!(f, "decimal"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::StringArray => write!(f, "string_array"),
            ColumnType::Bit => write!(f, "bit"),
        }
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Ok(ColumnType::Text),
            "integer" | "int" => Ok(ColumnType::Integer),
            "decimal" | "numeric" => Ok(ColumnType::Decimal),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "timestamp" | "datetime" => Ok(ColumnType::Timestamp),
            "string_array" | "array" => Ok(ColumnType::StringArray),
            "bit" => Ok(ColumnType::Bit),
            _ => Err(format!("Unknown column type: {}", s)),
        }
    }
}

/// A single column of a registry table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Declarative description of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name, also the name of its source directory
    pub name: String,
    /// Columns in storage order; non-excluded columns follow CSV order
    pub columns: Vec<ColumnDef>,
    /// Columns absent from the CSV files, filled with the load timestamp
    #[serde(default)]
    pub excluded_columns: Vec<String>,
    /// Columns identifying a logical row for cleaning purposes
    #[serde(default)]
    pub unique_key: Vec<String>,
    /// Tables that must be loaded before this one
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Large tables are loaded separately from the rest
    #[serde(default)]
    pub large: bool,
}

impl TableSpec {
    /// Create a table spec with no excluded columns, key or dependencies
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            excluded_columns: Vec::new(),
            unique_key: Vec::new(),
            dependencies: Vec::new(),
            large: false,
        }
    }

    pub fn with_excluded<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.excluded_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unique_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.unique_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.dependencies = tables.into_iter().map(Into::into).collect();
        self
    }

    /// All column names in storage order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns present in the CSV files, in file order
    pub fn csv_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !self.is_excluded(&c.name))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Declared type of a column
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.column_type)
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_columns.iter().any(|c| c == column)
    }

    /// Check the invariants of a single table
    ///
    /// Column names must be unique, and both the unique key and the excluded
    /// columns must be subsets of the declared columns.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.columns.is_empty() {
            return Err(PipelineError::Config(format!(
                "Table {} declares no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "Table {} declares column {} twice",
                    self.name, column.name
                )));
            }
        }

        for key in &self.unique_key {
            if !seen.contains(key.as_str()) {
                return Err(PipelineError::Config(format!(
                    "Unique key column {} is not a column of {}",
                    key, self.name
                )));
            }
        }

        for excluded in &self.excluded_columns {
            if !seen.contains(excluded.as_str()) {
                return Err(PipelineError::Config(format!(
                    "Excluded column {} is not a column of {}",
                    excluded, self.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    tables: Vec<TableSpec>,
}

/// Read-only mapping of table name to [`TableSpec`]
///
/// Tables keep their declaration order, which the dependency resolver uses to
/// break ties.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: Vec<TableSpec>,
}

impl SchemaRegistry {
    /// Build a registry from table specs, validating every invariant
    ///
    /// # Errors
    /// Returns a configuration error for duplicate tables, malformed table
    /// specs, dependencies on undeclared tables, or dependency cycles.
    pub fn new(tables: Vec<TableSpec>) -> PipelineResult<Self> {
        let registry = Self { tables };
        registry.validate()?;
        Ok(registry)
    }

    /// The registry shipped with the crate
    pub fn builtin() -> PipelineResult<Self> {
        Self::from_yaml(BUILTIN_REGISTRY)
    }

    /// Parse a registry from YAML
    pub fn from_yaml(content: &str) -> PipelineResult<Self> {
        let file: RegistryFile = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse registry: {}", e)))?;
        Self::new(file.tables)
    }

    /// Load a registry from a YAML file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read registry {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Look up a table
    ///
    /// # Errors
    /// Unknown tables are a configuration error.
    pub fn get(&self, name: &str) -> PipelineResult<&TableSpec> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| PipelineError::Config(format!("Unknown table: {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Table names in declaration order
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Names of tables flagged as large
    pub fn large_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| t.large)
            .map(|t| t.name.clone())
            .collect()
    }

    /// Names of tables not flagged as large
    pub fn regular_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| !t.large)
            .map(|t| t.name.clone())
            .collect()
    }

    fn validate(&self) -> PipelineResult<()> {
        let mut names = HashSet::new();
        for table in &self.tables {
            if !names.insert(table.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "Table {} is declared twice",
                    table.name
                )));
            }
            table.validate()?;
        }

        // Rejects unknown dependencies and cycles
        DependencyResolver::new(&self.tables).resolve()?;
        Ok(())
    }
}
