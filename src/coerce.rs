//! Type coercion engine
//!
//! CSV fragments are read as strings. Before rows reach storage every value
//! is converted to the semantic type its column declares, and then to the
//! storage type the target engine actually uses for that column.
//!
//! Empty strings and nulls coerce to null for every type. The only exception
//! is the optional "empty boolean is false" policy for source files that
//! encode booleans that way.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::database::StorageColumn;
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::{RawValue, RowBuffer};
use crate::registry::{ColumnType, TableSpec, TypeOverrides};

/// Timestamp layouts accepted in addition to RFC 3339
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A typed value ready for storage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CoercedValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    TextArray(Vec<String>),
}

impl CoercedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CoercedValue::Null)
    }
}

/// A row of typed values, positionally matching its storage columns
pub type CoercedRow = Vec<CoercedValue>;

/// Tunable coercion policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionOptions {
    /// Coerce empty boolean and bit values to `false` instead of null
    #[serde(default)]
    pub empty_boolean_as_false: bool,
}

/// Convert one raw value to its declared semantic type
///
/// # Errors
/// Returns a description of the problem when the value is not a valid
/// representation of `column_type`.
pub fn coerce_value(
    raw: Option<&str>,
    column_type: ColumnType,
    options: CoercionOptions,
) -> Result<CoercedValue, String> {
    let raw = match raw {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(empty_value(column_type, options)),
    };

    if column_type == ColumnType::Text {
        return Ok(CoercedValue::Text(raw.to_string()));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(empty_value(column_type, options));
    }

    match column_type {
        ColumnType::Text => Ok(CoercedValue::Text(raw.to_string())),
        ColumnType::Integer => trimmed
            .parse::<i64>()
            .map(CoercedValue::Integer)
            .map_err(|e| e.to_string()),
        ColumnType::Decimal => {
            let value = trimmed.parse::<f64>().map_err(|e| e.to_string())?;
            if value.is_finite() {
                Ok(CoercedValue::Decimal(value))
            } else {
                Err("not a finite number".to_string())
            }
        }
        ColumnType::Boolean => parse_boolean(trimmed, false).map(CoercedValue::Boolean),
        ColumnType::Bit => parse_boolean(trimmed, true).map(CoercedValue::Boolean),
        ColumnType::Timestamp => parse_timestamp(trimmed).map(CoercedValue::Timestamp),
        ColumnType::StringArray => serde_json::from_str::<Vec<String>>(trimmed)
            .map(CoercedValue::TextArray)
            .map_err(|e| format!("expected a JSON array of strings: {}", e)),
    }
}

fn empty_value(column_type: ColumnType, options: CoercionOptions) -> CoercedValue {
    match column_type {
        ColumnType::Boolean | ColumnType::Bit if options.empty_boolean_as_false => {
            CoercedValue::Boolean(false)
        }
        _ => CoercedValue::Null,
    }
}

fn parse_boolean(value: &str, accept_digits: bool) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        "1" if accept_digits => Ok(true),
        "0" if accept_digits => Ok(false),
        _ if accept_digits => Err("expected true, false, 1 or 0".to_string()),
        _ => Err("expected true or false".to_string()),
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.naive_utc());
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(timestamp);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| "unrecognized date/time format".to_string())
}

/// Convert a semantic value to the representation of its storage type
///
/// Only substituted columns change: booleans stored as integers become
/// `0`/`1` and string arrays stored as text become their JSON encoding.
pub fn adapt_to_storage(value: CoercedValue, storage: ColumnType) -> CoercedValue {
    match (value, storage) {
        (CoercedValue::Boolean(flag), ColumnType::Integer) => CoercedValue::Integer(i64::from(flag)),
        (CoercedValue::TextArray(items), ColumnType::Text) => {
            CoercedValue::Text(serde_json::Value::from(items).to_string())
        }
        (value, _) => value,
    }
}

#[derive(Debug, Clone)]
struct ColumnPlan {
    name: String,
    declared: ColumnType,
    storage: ColumnType,
}

/// Coerces the rows of one table
///
/// Built once per table from the buffer's column header, so every row is
/// converted with the same declared and storage types.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    table: String,
    plan: Vec<ColumnPlan>,
    options: CoercionOptions,
}

impl TypeCoercer {
    /// Plan coercion for `columns` of `spec`
    ///
    /// # Errors
    /// A buffer column that the table does not declare is a configuration error.
    pub fn new(
        spec: &TableSpec,
        columns: &[String],
        overrides: &TypeOverrides,
        options: CoercionOptions,
    ) -> PipelineResult<Self> {
        let plan = columns
            .iter()
            .map(|column| {
                let declared = spec.column_type(column).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "Column {} is not declared for {}",
                        column, spec.name
                    ))
                })?;
                Ok(ColumnPlan {
                    name: column.clone(),
                    declared,
                    storage: overrides.storage_type(&spec.name, column, declared),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(Self {
            table: spec.name.clone(),
            plan,
            options,
        })
    }

    /// Storage columns matching the coerced rows
    pub fn storage_columns(&self) -> Vec<StorageColumn> {
        self.plan
            .iter()
            .map(|c| StorageColumn::new(c.name.clone(), c.storage))
            .collect()
    }

    /// Coerce a single row; `index` is only used for error reporting
    pub fn coerce_row(&self, index: usize, row: &[RawValue]) -> PipelineResult<CoercedRow> {
        self.plan
            .iter()
            .zip(row)
            .map(|(column, raw)| {
                coerce_value(raw.as_deref(), column.declared, self.options)
                    .map(|value| adapt_to_storage(value, column.storage))
                    .map_err(|reason| PipelineError::TypeCoercion {
                        table: self.table.clone(),
                        column: column.name.clone(),
                        row: index,
                        value: raw.clone().unwrap_or_default(),
                        expected: column.declared,
                        reason,
                    })
            })
            .collect()
    }

    /// Coerce every row of a buffer, stopping at the first invalid value
    pub fn coerce_all(&self, buffer: &RowBuffer) -> PipelineResult<Vec<CoercedRow>> {
        buffer
            .rows()
            .iter()
            .enumerate()
            .map(|(index, row)| self.coerce_row(index, row))
            .collect()
    }
}
