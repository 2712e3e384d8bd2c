//! CLI binary entry point for registry-codes

use clap::{Parser, Subcommand};
use registry_codes::cli::commands::check::{CheckArgs, handle_check};
use registry_codes::cli::commands::load::{LoadArgs, handle_load};
use registry_codes::cli::commands::order::{OrderArgs, handle_order};
use registry_codes::cli::commands::status::{StatusArgs, handle_status};
use registry_codes::cli::{TableSelection, TargetArgs};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "registry-codes")]
#[command(about = "Load registry code tables from CSV into DuckDB or PostgreSQL")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the contents of the selected tables with their CSV data
    Load {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        selection: TableSelection,
        /// Role granted read access to the schema (requires --schema)
        #[arg(long)]
        grant: Option<String>,
        /// Rows per insert transaction
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Check every CSV row has the expected number of fields
    Check {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        selection: TableSelection,
    },

    /// Print the dependency order tables are loaded in
    Order {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        selection: TableSelection,
    },

    /// Show the row count of each table in the target
    Status {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        selection: TableSelection,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Load {
            target,
            selection,
            grant,
            chunk_size,
        } => {
            let args = LoadArgs {
                target,
                selection,
                grant,
                chunk_size,
            };
            handle_load(&args)
        }
        Commands::Check { target, selection } => {
            let args = CheckArgs { target, selection };
            handle_check(&args)
        }
        Commands::Order { target, selection } => {
            let args = OrderArgs { target, selection };
            handle_order(&args)
        }
        Commands::Status { target, selection } => {
            let args = StatusArgs { target, selection };
            handle_status(&args)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
