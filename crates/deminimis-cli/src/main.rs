mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::aggregate::AggregateArgs;
use commands::amount::ParseAmountArgs;
use commands::extract::ExtractArgs;
use commands::sme::SmeArgs;
use commands::store::StoreArgs;

/// De Minimis state-aid extraction and group aggregation
#[derive(Parser)]
#[command(
    name = "dmx",
    version,
    about = "De Minimis state-aid extraction and group aggregation",
    long_about = "A CLI for extracting De Minimis grants from saved registry pages or \
                  exports, aggregating them across a company group against the \
                  300 000 EUR ceiling, and classifying enterprise size."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter, e.g. "info" or "deminimis_core=debug". RUST_LOG takes precedence.
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Path to a JSON file with registry settings (ceiling, windows, thresholds)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an Italian-formatted amount ("€ 1.234,56")
    ParseAmount(ParseAmountArgs),
    /// Extract aid records from a saved results page or export
    Extract(ExtractArgs),
    /// Aggregate per-company results across a company group
    Aggregate(AggregateArgs),
    /// Classify enterprise size under the EU SME definition
    Sme(SmeArgs),
    /// Inspect or edit a saved results file
    Store(StoreArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::ParseAmount(args) => commands::amount::run_parse_amount(args),
        Commands::Extract(args) => commands::extract::run_extract(args, cli.config.as_deref()),
        Commands::Aggregate(args) => commands::aggregate::run_aggregate(args, cli.config.as_deref()),
        Commands::Sme(args) => commands::sme::run_sme(args),
        Commands::Store(args) => commands::store::run_store(args),
        Commands::Version => {
            println!("dmx {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
