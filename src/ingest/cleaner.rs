//! Unique-key cleaning
//!
//! Rows with a null key column are dropped first, then only the first row of
//! each distinct key combination is kept. Keys compare as raw strings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::RowBuffer;
use crate::error::{PipelineError, PipelineResult};
use crate::registry::{SchemaRegistry, TableSpec};

/// What the cleaner removed from a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    /// Rows dropped for a null or empty key column
    pub missing_count: usize,
    /// Rows dropped as repeats of an earlier key
    pub duplicate_count: usize,
}

impl CleanReport {
    pub fn rows_removed(&self) -> usize {
        self.missing_count + self.duplicate_count
    }
}

/// Clean a buffer using the unique key of `spec`
///
/// # Errors
/// A unique key column missing from the buffer is a configuration error.
pub fn clean_rows(spec: &TableSpec, buffer: RowBuffer) -> PipelineResult<(RowBuffer, CleanReport)> {
    if spec.unique_key.is_empty() {
        return Ok((buffer, CleanReport::default()));
    }

    let key_indices = spec
        .unique_key
        .iter()
        .map(|column| {
            buffer.column_index(column).ok_or_else(|| {
                PipelineError::Config(format!(
                    "Unique key column {} missing from {} rows",
                    column, spec.name
                ))
            })
        })
        .collect::<PipelineResult<Vec<usize>>>()?;

    let mut report = CleanReport::default();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut kept = Vec::with_capacity(buffer.len());

    for row in buffer.rows() {
        let key: Option<Vec<String>> = key_indices
            .iter()
            .map(|&i| row[i].as_deref().filter(|v| !v.is_empty()).map(str::to_string))
            .collect();

        match key {
            None => report.missing_count += 1,
            Some(key) => {
                if seen.insert(key) {
                    kept.push(row.clone());
                } else {
                    report.duplicate_count += 1;
                }
            }
        }
    }

    Ok((buffer.with_rows(kept), report))
}

/// Applies the registry's cleaning policy to loaded tables
pub struct DataCleaner<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> DataCleaner<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Clean a table's rows and log what was removed
    pub fn clean(&self, table: &str, buffer: RowBuffer) -> PipelineResult<(RowBuffer, CleanReport)> {
        let spec = self.registry.get(table)?;
        let (cleaned, report) = clean_rows(spec, buffer)?;

        if report.duplicate_count > 0 {
            tracing::warn!(
                "Removed {} duplicate rows in {}",
                report.duplicate_count,
                table
            );
        }
        if report.missing_count > 0 {
            tracing::warn!(
                "Removed {} rows with missing key values in {}",
                report.missing_count,
                table
            );
        }
        if report.rows_removed() == 0 {
            tracing::info!("No data cleaning applied to data loaded into {}", table);
        }

        Ok((cleaned, report))
    }
}
