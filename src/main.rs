use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use compound_credit::analytics::{ScoreReport, ScoreTable};
use compound_credit::config::{Config, Logging};
use compound_credit::pipeline::{self, RunOptions};

/// Rule-based credit scores for Compound V2 wallets
#[derive(Parser)]
#[command(name = "compound-credit", version)]
struct Cli {
    /// TOML file overriding the default rule table and settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score every wallet in the datasets and write the ranked top N
    Score {
        /// Transaction dataset JSON files
        #[arg(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "top_wallets.csv")]
        output: PathBuf,

        /// Number of wallets to keep (overrides output.top_n)
        #[arg(long)]
        top_n: Option<usize>,

        /// Include feature columns in the output
        #[arg(long)]
        explain: bool,

        /// Also write features and scores for every wallet here
        #[arg(long)]
        features_out: Option<PathBuf>,
    },

    /// Summarize a score CSV: distribution, outliers, extremes, correlations
    Report {
        #[arg(default_value = "top_wallets.csv")]
        scores: PathBuf,

        /// Feature CSV (from --features-out) used for correlations
        #[arg(long)]
        features: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(logging: &Logging) -> Result<WorkerGuard> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(&logging.directory)?;

    let file_appender = tracing_appender::rolling::daily(&logging.directory, &logging.file_prefix);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.default_filter)),
        )
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(cli.config.as_deref())?;

    // Held until exit so buffered file logs are flushed
    let _guard = init_tracing(&config.logging)?;

    match cli.command {
        Command::Score {
            inputs,
            output,
            top_n,
            explain,
            features_out,
        } => {
            if let Some(top_n) = top_n {
                config.output.top_n = top_n;
            }
            config.output.explain |= explain;
            config.validate()?;

            info!("🏦 Compound V2 wallet credit scoring");
            let options = RunOptions {
                inputs,
                output,
                features_out,
            };
            match pipeline::run(&config, &options) {
                Ok(summary) => {
                    info!(
                        "👋 Done: {} wallets scored, {} written",
                        summary.wallets, summary.written
                    );
                    Ok(())
                }
                Err(e) => {
                    error!("Scoring run failed: {:#}", e);
                    Err(e)
                }
            }
        }
        Command::Report { scores, features, json } => {
            let table = ScoreTable::from_path(&scores)?;
            let feature_table = features.as_deref().map(ScoreTable::from_path).transpose()?;
            let report = ScoreReport::build(&table, feature_table.as_ref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            Ok(())
        }
    }
}
