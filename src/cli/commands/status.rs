//! Target status CLI command
//!
//! Prints the row count of every selected table in the target database.

use crate::cli::error::CliError;
use crate::cli::{TableSelection, TargetArgs, load_registry, runtime};
use crate::database;
use crate::pipeline::{Pipeline, PipelineOptions};

/// Status command arguments
#[derive(Debug, Clone)]
pub struct StatusArgs {
    pub target: TargetArgs,
    pub selection: TableSelection,
}

/// Show row counts in the target
pub fn handle_status(args: &StatusArgs) -> Result<(), CliError> {
    let config = args.target.resolve_config()?;
    let registry = load_registry(&config)?;
    let tables = args.selection.resolve(&registry)?;

    let rt = runtime()?;
    let counts = rt.block_on(async {
        let backend = database::connect(&config).await?;
        if !backend.health_check().await? {
            return Err(CliError::Database(database::DatabaseError::ConnectionFailed(
                format!("{} backend is not healthy", backend.backend_type()),
            )));
        }
        let pipeline = Pipeline::new(
            &registry,
            backend.as_ref(),
            &config.load.tables_dir,
            PipelineOptions::from_config(&config),
        );
        let counts = pipeline.row_counts(&tables).await;
        backend.close().await?;
        Ok(counts?)
    })?;

    println!("{:<24} {:>10}", "Table", "Rows");
    for (table, count) in counts {
        match count {
            Some(count) => println!("{:<24} {:>10}", table, count),
            None => println!("{:<24} {:>10}", table, "missing"),
        }
    }
    Ok(())
}
