//! Full-table replace with chunked inserts

use crate::coerce::CoercedRow;
use crate::database::{StorageBackend, StorageColumn, TableRef};
use crate::error::{PipelineError, PipelineResult};

pub use crate::config::DEFAULT_CHUNK_SIZE;

/// Replaces the contents of a table
///
/// Existing rows are deleted in their own transaction, then the new rows are
/// inserted one chunk per transaction. The first failed chunk is rolled back
/// and stops the write; chunks committed before it stay in place.
pub struct BulkWriter<'a> {
    backend: &'a dyn StorageBackend,
    chunk_size: usize,
}

impl<'a> BulkWriter<'a> {
    /// # Errors
    /// A chunk size of zero is a configuration error.
    pub fn new(backend: &'a dyn StorageBackend, chunk_size: usize) -> PipelineResult<Self> {
        if chunk_size == 0 {
            return Err(PipelineError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            backend,
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Replace every row of `table` with `rows`
    ///
    /// # Returns
    /// Number of rows committed
    pub async fn write(
        &self,
        table: &TableRef,
        columns: &[StorageColumn],
        rows: &[CoercedRow],
    ) -> PipelineResult<u64> {
        let deleted = self.backend.delete_all(table).await?;
        tracing::info!("Deleted {} existing rows from {}", deleted, table);

        let total = rows.len();
        let mut committed = 0u64;

        for (index, chunk) in rows.chunks(self.chunk_size).enumerate() {
            match self.backend.insert_chunk(table, columns, chunk).await {
                Ok(inserted) => {
                    committed += inserted;
                    tracing::info!("Inserted {}/{} rows into {}", committed, total, table);
                }
                Err(e) => {
                    tracing::error!(
                        "Error inserting chunk {} into {} ({} rows committed): {}",
                        index + 1,
                        table,
                        committed,
                        e
                    );
                    return Err(e.into());
                }
            }
        }

        Ok(committed)
    }
}
