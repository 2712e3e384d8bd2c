//! CSV ingestion for registry tables
//!
//! Each table has a directory of headerless CSV fragments under the tables
//! root. The loader concatenates the fragments into a [`RowBuffer`] of raw
//! string values and the cleaner removes rows with missing or duplicate
//! unique keys. Type conversion happens later, in [`crate::coerce`].

mod cleaner;
mod loader;

pub use cleaner::{CleanReport, DataCleaner, clean_rows};
pub use loader::{DataLoader, MalformedRow, TableScan, discover_table_files};

/// A raw cell value: a string, or null for an empty field
pub type RawValue = Option<String>;

/// In-memory rows for one table, before type coercion
///
/// Rows are positional and share one column header, so `rows[i][j]` is the
/// value of `columns[j]` in row `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBuffer {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RowBuffer {
    /// Create an empty buffer with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a buffer from rows of optional string slices
    ///
    /// Convenient for building fixtures; every row must match the column count.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Option<&str>>>,
    ) -> Self {
        let mut buffer = Self::new(columns);
        for row in rows {
            buffer.push(row.into_iter().map(|v| v.map(str::to_string)).collect());
        }
        buffer
    }

    /// Append a row
    ///
    /// # Panics
    /// Panics if the row width differs from the column count.
    pub fn push(&mut self, row: Vec<RawValue>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "row width does not match column count"
        );
        self.rows.push(row);
    }

    /// Append another buffer's rows, preserving their order
    pub fn extend(&mut self, other: RowBuffer) {
        self.rows.extend(other.rows);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<RawValue>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column in the header
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of `column` in row `row`, `None` when null or out of range
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    /// Add a column with the same value in every row
    pub(crate) fn append_constant_column(&mut self, column: &str, value: &str) {
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(Some(value.to_string()));
        }
    }

    pub(crate) fn with_rows(&self, rows: Vec<Vec<RawValue>>) -> RowBuffer {
        RowBuffer {
            columns: self.columns.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_lookup() {
        let buffer = RowBuffer::from_rows(
            ["k", "v"],
            vec![vec![Some("1"), None], vec![Some("2"), Some("b")]],
        );
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.value(0, "k"), Some("1"));
        assert_eq!(buffer.value(0, "v"), None);
        assert_eq!(buffer.value(1, "v"), Some("b"));
        assert_eq!(buffer.value(5, "v"), None);
    }

    #[test]
    fn test_append_constant_column() {
        let mut buffer = RowBuffer::from_rows(["k"], vec![vec![Some("1")], vec![Some("2")]]);
        buffer.append_constant_column("created", "2024-01-01 00:00:00");
        assert_eq!(buffer.columns(), &["k", "created"]);
        assert_eq!(buffer.value(1, "created"), Some("2024-01-01 00:00:00"));
    }

    #[test]
    #[should_panic(expected = "row width")]
    fn test_push_rejects_wrong_width() {
        let mut buffer = RowBuffer::new(["a", "b"]);
        buffer.push(vec![None]);
    }
}
