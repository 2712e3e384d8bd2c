//! Dependency order CLI command

use crate::cli::error::CliError;
use crate::cli::{TableSelection, TargetArgs, load_registry};
use crate::registry::DependencyResolver;

/// Order command arguments
#[derive(Debug, Clone)]
pub struct OrderArgs {
    pub target: TargetArgs,
    pub selection: TableSelection,
}

/// Print the order tables would be loaded in
pub fn handle_order(args: &OrderArgs) -> Result<(), CliError> {
    let config = args.target.resolve_config()?;
    let registry = load_registry(&config)?;
    let selected = args.selection.resolve(&registry)?;

    let order = DependencyResolver::new(registry.tables()).order_subset(&selected)?;

    for (position, table) in order.iter().enumerate() {
        let spec = registry.get(table)?;
        let mut line = format!("{:>3}. {}", position + 1, table);
        if !spec.dependencies.is_empty() {
            line.push_str(&format!(" (after {})", spec.dependencies.join(", ")));
        }
        if spec.large {
            line.push_str(" [large]");
        }
        println!("{}", line);
    }
    Ok(())
}
