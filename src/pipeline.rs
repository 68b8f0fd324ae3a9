/// Load → aggregate → score → rank → write, once

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::{info, instrument};

use crate::analytics::{aggregate, rank, ScoreRecord, WalletScorer};
use crate::config::Config;
use crate::core::{shorten_address, Transaction};
use crate::export::write_scores;
use crate::ingest::{LoadReport, TransactionLoader};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Transaction dataset files, read in order
    pub inputs: Vec<PathBuf>,

    /// Ranked score CSV
    pub output: PathBuf,

    /// Optional dump of every wallet's features and score
    pub features_out: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub load: LoadReport,
    pub wallets: usize,
    pub written: usize,
    pub top_score: Option<u8>,
}

/// Aggregate and score every wallet, returned in rank order (not truncated).
#[instrument(skip_all, fields(transactions = transactions.len()))]
pub fn score_transactions(transactions: &[Transaction], scorer: &WalletScorer) -> Vec<ScoreRecord> {
    let features: Vec<_> = aggregate(transactions).into_values().collect();
    let total = features.len();
    rank(scorer.score_all(features), total)
}

#[instrument(skip_all, fields(inputs = options.inputs.len()))]
pub fn run(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    let started = Instant::now();
    let scorer = WalletScorer::new(config.rules.clone()).context("invalid scoring rules")?;

    let (transactions, load) = TransactionLoader::load_files(options.inputs.as_slice())?;
    if transactions.is_empty() {
        bail!("no valid transactions loaded from {} input files", load.files);
    }
    info!("✅ Loaded {} transactions ({} skipped)", load.loaded, load.skipped);

    let ranked = score_transactions(&transactions, &scorer);
    info!("🧮 Scored {} wallets", ranked.len());

    if let Some(path) = &options.features_out {
        write_scores(path, &ranked, true)?;
        info!("💾 Wrote features for {} wallets to {}", ranked.len(), path.display());
    }

    let top = &ranked[..ranked.len().min(config.output.top_n)];
    let written = write_scores(&options.output, top, config.output.explain)?;
    info!("💾 Wrote top {} wallets to {}", written, options.output.display());

    if let Some(best) = top.first() {
        info!("🏆 Highest score {} ({})", best.score, shorten_address(&best.wallet));
    }
    info!("Run finished in {:.2?}", started.elapsed());

    Ok(RunSummary {
        load,
        wallets: ranked.len(),
        written,
        top_score: top.first().map(|r| r.score),
    })
}
