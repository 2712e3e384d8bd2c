//! Source completeness CLI command
//!
//! Checks that every CSV row of the selected tables has exactly the number
//! of fields the registry expects. Storage is never touched.

use crate::cli::error::CliError;
use crate::cli::{TableSelection, TargetArgs, load_registry};
use crate::error::PipelineError;
use crate::ingest::DataLoader;
use crate::registry::DependencyResolver;

/// Check command arguments
#[derive(Debug, Clone)]
pub struct CheckArgs {
    pub target: TargetArgs,
    pub selection: TableSelection,
}

/// Scan the source files of the selected tables
pub fn handle_check(args: &CheckArgs) -> Result<(), CliError> {
    let config = args.target.resolve_config()?;
    let registry = load_registry(&config)?;
    let selected = args.selection.resolve(&registry)?;

    let tables = DependencyResolver::new(registry.tables()).order_subset(&selected)?;

    let loader = DataLoader::new(&registry, &config.load.tables_dir);
    let mut problems = 0usize;

    for table in &tables {
        match loader.scan(table) {
            Ok(scan) => {
                println!(
                    "{}: {} rows in {} files",
                    table,
                    scan.rows,
                    scan.files.len()
                );
                if scan.files.is_empty() {
                    println!("  no CSV files found");
                }
                for row in &scan.malformed {
                    println!(
                        "  {}:{} expected {} fields, found {}",
                        row.file.display(),
                        row.line,
                        row.expected,
                        row.found
                    );
                }
                problems += scan.malformed.len();
            }
            Err(PipelineError::NotFound(dir)) => {
                println!("{}: directory {} not found", table, dir.display());
                problems += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if problems == 0 {
        println!("All {} tables complete", tables.len());
        Ok(())
    } else {
        Err(CliError::IncompleteData(problems))
    }
}
