// Mule Detector - CLI
// analyze a CSV, print the template, or run the built-in sample

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mule_detector::sample::{sample_transactions, TEMPLATE_CSV};
use mule_detector::{load_csv, DetectionConfig, DetectionReport, Engine, Transaction};
use std::path::PathBuf;
use tracing::{info, warn};

/// Money-muling ring detector over transaction CSV files
#[derive(Parser, Debug)]
#[command(name = "mule-detector", version, about)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run detection over a transactions CSV
    Analyze {
        /// CSV with transaction_id, sender_id, receiver_id, amount, timestamp
        csv: PathBuf,

        /// JSON detection config; omitted fields keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the CSV template
    Template,
    /// Run detection over the built-in sample dataset
    Sample {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Command::Analyze { csv, config, output } => {
            let config = match config {
                Some(path) => DetectionConfig::from_file(&path)?,
                None => DetectionConfig::default(),
            };

            let ingested = load_csv(&csv)?;
            if !ingested.rejected.is_empty() {
                warn!(
                    rejected = ingested.rejected.len(),
                    "some rows were rejected during ingestion"
                );
            }
            info!(
                transactions = ingested.summary.total_transactions,
                accounts = ingested.summary.unique_accounts,
                "dataset loaded"
            );

            run(config, &ingested.transactions, output)
        }
        Command::Template => {
            print!("{TEMPLATE_CSV}");
            Ok(())
        }
        Command::Sample { output } => run(DetectionConfig::default(), &sample_transactions(), output),
    }
}

fn run(config: DetectionConfig, transactions: &[Transaction], output: Option<PathBuf>) -> Result<()> {
    let mut engine = Engine::new(config).context("Invalid detection config")?;
    let outcome = engine.process(transactions).context("Detection run failed")?;
    let report = DetectionReport::build(&outcome, transactions);

    match output {
        Some(path) => {
            report.write_json_file(&path)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{}", report.to_json_string()?),
    }
    Ok(())
}

/// Logs go to stderr so the report on stdout stays machine-readable.
/// `RUST_LOG` overrides `--log-level`.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
