//! Table fragment discovery and parsing

use chrono::{Local, NaiveDateTime, NaiveTime};
use std::path::{Path, PathBuf};

use super::RowBuffer;
use crate::error::{PipelineError, PipelineResult};
use crate::registry::{SchemaRegistry, TableSpec};

/// Recognized fragment extensions and their field delimiters
const TABULAR_EXTENSIONS: &[(&str, u8)] = &[("csv", b','), ("tsv", b'\t')];

/// Format of the load timestamp written into excluded columns
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A source row with the wrong number of fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub file: PathBuf,
    /// One-based line number within the file
    pub line: u64,
    pub expected: usize,
    pub found: usize,
}

impl From<MalformedRow> for PipelineError {
    fn from(row: MalformedRow) -> Self {
        PipelineError::MalformedRow {
            file: row.file,
            line: row.line,
            expected: row.expected,
            found: row.found,
        }
    }
}

/// Result of scanning every fragment of a table
#[derive(Debug, Clone, Default)]
pub struct TableScan {
    /// Fragments that were read, in load order
    pub files: Vec<PathBuf>,
    /// Rows that matched the expected layout
    pub rows: usize,
    /// Every row that did not
    pub malformed: Vec<MalformedRow>,
}

impl TableScan {
    pub fn is_complete(&self) -> bool {
        self.malformed.is_empty()
    }
}

/// Parsed content of one fragment
struct Fragment {
    buffer: RowBuffer,
    malformed: Vec<MalformedRow>,
}

/// Find every tabular file in a table directory
///
/// Files are sorted by name so fragments always concatenate in the same
/// order.
///
/// # Errors
/// Returns [`PipelineError::NotFound`] if the directory does not exist.
pub fn discover_table_files(table_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    if !table_dir.is_dir() {
        return Err(PipelineError::NotFound(table_dir.to_path_buf()));
    }

    let base = glob::Pattern::escape(&table_dir.to_string_lossy());
    let mut files = Vec::new();
    for (extension, _) in TABULAR_EXTENSIONS {
        let pattern = format!("{}/*.{}", base, extension);
        let entries = glob::glob(&pattern)
            .map_err(|e| PipelineError::Config(format!("Invalid pattern {}: {}", pattern, e)))?;

        for entry in entries {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        files.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing path: {}", e);
                }
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn delimiter_for(path: &Path) -> u8 {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    TABULAR_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, delimiter)| *delimiter)
        .unwrap_or(b',')
}

/// Parse one headerless fragment into rows of `columns`
///
/// Empty fields become nulls. Rows whose field count differs from the
/// column count are collected rather than loaded.
fn read_fragment(path: &Path, columns: &[&str]) -> PipelineResult<Fragment> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter_for(path))
        .from_path(path)
        .map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut buffer = RowBuffer::new(columns.iter().copied());
    let mut malformed = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        if record.len() != columns.len() {
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 1);
            malformed.push(MalformedRow {
                file: path.to_path_buf(),
                line,
                expected: columns.len(),
                found: record.len(),
            });
            continue;
        }

        buffer.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Fragment { buffer, malformed })
}

/// Loads table fragments from `<tables_dir>/<table>/`
pub struct DataLoader<'a> {
    registry: &'a SchemaRegistry,
    tables_dir: PathBuf,
}

impl<'a> DataLoader<'a> {
    pub fn new(registry: &'a SchemaRegistry, tables_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            tables_dir: tables_dir.into(),
        }
    }

    /// Directory holding a table's fragments
    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.tables_dir.join(table)
    }

    /// Load every fragment of a table into one buffer
    ///
    /// Excluded columns are appended with the start of the current day, the
    /// same value for every row of the load.
    ///
    /// # Errors
    /// - Configuration error for tables missing from the registry
    /// - [`PipelineError::NotFound`] if the table directory is missing
    /// - [`PipelineError::MalformedRow`] for the first row with the wrong field count
    pub fn load(&self, table: &str) -> PipelineResult<RowBuffer> {
        let today = Local::now().date_naive().and_time(NaiveTime::MIN);
        self.load_at(table, today)
    }

    /// Load a table using `loaded_at` as the value of excluded columns
    pub fn load_at(&self, table: &str, loaded_at: NaiveDateTime) -> PipelineResult<RowBuffer> {
        let spec = self.registry.get(table)?;
        let table_dir = self.table_dir(table);
        let files = discover_table_files(&table_dir)?;
        let columns = spec.csv_columns();

        let mut buffer = RowBuffer::new(columns.iter().copied());
        if files.is_empty() {
            tracing::warn!("No CSV files found in directory {}", table_dir.display());
            append_excluded(&mut buffer, spec, loaded_at);
            return Ok(buffer);
        }

        for file in &files {
            tracing::info!("Reading {}", file.display());
            let fragment = read_fragment(file, &columns)?;
            if let Some(row) = fragment.malformed.into_iter().next() {
                return Err(row.into());
            }
            buffer.extend(fragment.buffer);
        }

        append_excluded(&mut buffer, spec, loaded_at);
        tracing::info!("Loaded {} rows from {} files for {}", buffer.len(), files.len(), table);
        Ok(buffer)
    }

    /// Check every fragment's field counts without stopping at the first problem
    pub fn scan(&self, table: &str) -> PipelineResult<TableScan> {
        let spec = self.registry.get(table)?;
        let files = discover_table_files(&self.table_dir(table))?;
        let columns = spec.csv_columns();

        let mut scan = TableScan::default();
        for file in files {
            let fragment = read_fragment(&file, &columns)?;
            scan.rows += fragment.buffer.len();
            scan.malformed.extend(fragment.malformed);
            scan.files.push(file);
        }

        Ok(scan)
    }
}

fn append_excluded(buffer: &mut RowBuffer, spec: &TableSpec, loaded_at: NaiveDateTime) {
    let value = loaded_at.format(TIMESTAMP_FORMAT).to_string();
    for column in &spec.excluded_columns {
        buffer.append_constant_column(column, &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ColumnDef, ColumnType};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(vec![
            TableSpec::new(
                "codes",
                vec![
                    ColumnDef::new("code", ColumnType::Text),
                    ColumnDef::new("created", ColumnType::Timestamp),
                    ColumnDef::new("description", ColumnType::Text),
                ],
            )
            .with_excluded(["created"]),
        ])
        .unwrap()
    }

    fn loaded_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_fragments_concatenate_in_name_order() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("codes");
        fs::create_dir(&table_dir).unwrap();
        fs::write(table_dir.join("b.csv"), "B1,second\n").unwrap();
        fs::write(table_dir.join("a.csv"), "A1,first\nA2,\n").unwrap();
        fs::write(table_dir.join("notes.txt"), "ignored").unwrap();

        let registry = registry();
        let buffer = DataLoader::new(&registry, dir.path())
            .load_at("codes", loaded_at())
            .unwrap();

        assert_eq!(buffer.columns(), &["code", "description", "created"]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.value(0, "code"), Some("A1"));
        assert_eq!(buffer.value(1, "description"), None);
        assert_eq!(buffer.value(2, "code"), Some("B1"));
        for row in 0..3 {
            assert_eq!(buffer.value(row, "created"), Some("2024-03-01 00:00:00"));
        }
    }

    #[test]
    fn test_tsv_fragments() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("codes");
        fs::create_dir(&table_dir).unwrap();
        fs::write(table_dir.join("a.tsv"), "X\twith, comma\n").unwrap();

        let registry = registry();
        let buffer = DataLoader::new(&registry, dir.path())
            .load_at("codes", loaded_at())
            .unwrap();
        assert_eq!(buffer.value(0, "description"), Some("with, comma"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let registry = registry();
        let err = DataLoader::new(&registry, dir.path()).load("codes").unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_unknown_table() {
        let dir = tempdir().unwrap();
        let registry = registry();
        let err = DataLoader::new(&registry, dir.path()).load("other").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_directory_gives_empty_buffer() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("codes")).unwrap();
        let registry = registry();
        let buffer = DataLoader::new(&registry, dir.path()).load("codes").unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.columns().len(), 3);
    }

    #[test]
    fn test_short_row_is_malformed() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("codes");
        fs::create_dir(&table_dir).unwrap();
        fs::write(table_dir.join("a.csv"), "A1,first\nA2\n").unwrap();

        let registry = registry();
        let err = DataLoader::new(&registry, dir.path()).load("codes").unwrap_err();
        match err {
            PipelineError::MalformedRow {
                line,
                expected,
                found,
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected malformed row, got {other}"),
        }
    }

    #[test]
    fn test_scan_collects_every_malformed_row() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("codes");
        fs::create_dir(&table_dir).unwrap();
        fs::write(table_dir.join("a.csv"), "A1\nA2,ok\nA3,too,many\n").unwrap();

        let registry = registry();
        let scan = DataLoader::new(&registry, dir.path()).scan("codes").unwrap();
        assert_eq!(scan.rows, 1);
        assert_eq!(scan.malformed.len(), 2);
        assert_eq!(scan.malformed[0].line, 1);
        assert_eq!(scan.malformed[1].found, 3);
        assert!(!scan.is_complete());
    }
}
