use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Recurring payment detection over bank transaction exports
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Find and maintain recurring payment bundles")]
struct Cli {
    /// Engine configuration (TOML). Built-in defaults when omitted.
    #[arg(short, long, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect new bundles and fold transactions into existing ones
    Update {
        /// JSON array of transactions to consider
        #[arg(short, long)]
        transactions: PathBuf,

        /// JSON array of previously saved bundles, with their operations
        #[arg(short, long)]
        bundles: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print one line per bundle with its label, amount and frequency
    Summary {
        /// JSON array of bundles
        bundles: PathBuf,
    },

    /// List the rules the engine knows about and how they are configured
    Rules,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Update {
            transactions,
            bundles,
            output,
        } => commands::update(&config, &transactions, bundles.as_deref(), output.as_deref()),
        Commands::Summary { bundles } => commands::summary(&bundles),
        Commands::Rules => commands::rules(&config),
    }
}
