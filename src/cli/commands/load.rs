//! Load CLI command
//!
//! Runs the pipeline against the configured target and prints a per-table
//! summary.

use crate::cli::error::CliError;
use crate::cli::{TableSelection, TargetArgs, load_registry, runtime};
use crate::database;
use crate::pipeline::{Pipeline, PipelineOptions, RunReport, TableOutcome};

/// Load command arguments
#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub target: TargetArgs,
    pub selection: TableSelection,
    /// Role granted read access to the schema
    pub grant: Option<String>,
    /// Rows per insert transaction
    pub chunk_size: Option<usize>,
}

/// Load the selected tables
pub fn handle_load(args: &LoadArgs) -> Result<(), CliError> {
    let mut config = args.target.resolve_config()?;
    if let Some(chunk_size) = args.chunk_size {
        config.load.chunk_size = chunk_size;
    }
    if let Some(role) = &args.grant {
        config.postgres.grant_role = Some(role.clone());
    }
    config.validate()?;

    let registry = load_registry(&config)?;
    let tables = args.selection.resolve(&registry)?;

    let rt = runtime()?;
    let report = rt.block_on(async {
        let backend = database::connect(&config).await?;
        let pipeline = Pipeline::new(
            &registry,
            backend.as_ref(),
            &config.load.tables_dir,
            PipelineOptions::from_config(&config),
        );
        let report = pipeline.run(&tables).await;
        backend.close().await?;
        Ok::<_, CliError>(report?)
    })?;

    print_report(&report);

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::TablesFailed(
            report
                .failed_tables()
                .into_iter()
                .map(str::to_string)
                .collect(),
        ))
    }
}

fn print_report(report: &RunReport) {
    println!("{:<24} {:<8} {:>10}  Notes", "Table", "Status", "Rows");
    for entry in &report.tables {
        match &entry.outcome {
            TableOutcome::Loaded {
                rows_written,
                clean,
                ..
            } => {
                let notes = if clean.rows_removed() > 0 {
                    format!(
                        "{} duplicate, {} missing key removed",
                        clean.duplicate_count, clean.missing_count
                    )
                } else {
                    String::new()
                };
                println!(
                    "{:<24} {:<8} {:>10}  {}",
                    entry.table, "loaded", rows_written, notes
                );
            }
            TableOutcome::Empty { .. } => {
                println!(
                    "{:<24} {:<8} {:>10}  no source rows, existing rows kept",
                    entry.table, "empty", 0
                );
            }
            TableOutcome::Failed { error } => {
                println!("{:<24} {:<8} {:>10}  {}", entry.table, "failed", "-", error);
            }
        }
    }
    println!("Total rows written: {}", report.total_rows());
}
