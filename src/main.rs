use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod batch;
mod config;
mod error;
mod models;
mod relay;
mod report;
mod server;
mod store;
mod validate;

use crate::config::{ScoringArgs, ScoringConfig, ServeArgs, ServeConfig};

#[derive(Parser)]
#[command(name = "placement-predictor")]
#[command(about = "Validates candidate profiles and relays them to a placement scoring service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the prediction relay and results views over HTTP
    Serve(ServeArgs),
    /// Print the form's field table
    Fields,
    /// Validate candidates from a CSV file without scoring them
    Validate {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score candidates from a CSV file and write a markdown report
    Predict {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        scoring: ScoringArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("placement_predictor=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_valid_records(csv: &std::path::Path) -> anyhow::Result<Vec<models::SubmissionRecord>> {
    let candidates = batch::read_candidates_from_path(csv)
        .with_context(|| format!("failed to read candidates from {}", csv.display()))?;

    match batch::validate_candidates(&candidates) {
        Ok(records) => Ok(records),
        Err(failures) => {
            for (row, errors) in &failures {
                for (field, message) in errors.iter() {
                    println!("- row {row}, {field}: {message}");
                }
            }
            anyhow::bail!(
                "{} of {} candidates failed validation",
                failures.len(),
                candidates.len()
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Serve(args) => {
            let config = ServeConfig::resolve(&args, &config::process_env)?;
            let shutdown = CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, draining connections");
                }
                trigger.cancel();
            });
            server::serve(config, shutdown).await?;
        }
        Commands::Fields => {
            println!(
                "{}",
                serde_json::to_string_pretty(&validate::field_table())?
            );
        }
        Commands::Validate { csv } => {
            let records = load_valid_records(&csv)?;
            println!("All {} candidates are valid.", records.len());
        }
        Commands::Predict { csv, scoring, out } => {
            let config = ScoringConfig::resolve(&scoring, &config::process_env)?;
            let records = load_valid_records(&csv)?;
            let relay = relay::Relay::new(config.url, config.timeout)
                .context("failed to build scoring service client")?;

            let reports = batch::score_candidates(&relay, &records).await;
            let report = report::build_batch_report(
                &csv.display().to_string(),
                chrono::Utc::now(),
                &reports,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
