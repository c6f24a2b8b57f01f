//! `billscan`: pull account and charge fields out of scanned utility bills.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{batch, check, config, process};

/// Read scanned utility-bill PDFs and report their billing fields as JSON,
/// CSV or text.
#[derive(Parser)]
#[command(name = "billscan", author, version, about)]
struct Cli {
    /// Log more detail to stderr (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file to use instead of the per-user config.json
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from one bill
    Process(process::ProcessArgs),

    /// Extract fields from every PDF matching a glob, optionally with an account summary
    Batch(batch::BatchArgs),

    /// Report whether pdftoppm and tesseract can be started
    Check,

    /// Inspect or edit the settings file
    Config(config::ConfigArgs),
}

/// Filter directive for a `-v` count.
fn log_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(verbose)));

    // stdout carries command output, so diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Check => check::run(config_path).await,
        Commands::Config(args) => config::run(args).await,
    }
}
