use std::cmp::Ordering;

use tracing::debug;

use super::scorer::ScoreRecord;

/// Highest score first; equal scores by wallet address ascending.
pub fn rank_order(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.wallet.cmp(&b.wallet))
}

/// Sort score records and keep the first `top_n`.
pub fn rank(mut records: Vec<ScoreRecord>, top_n: usize) -> Vec<ScoreRecord> {
    let total = records.len();
    records.sort_by(rank_order);
    records.truncate(top_n);
    debug!("Ranked {} wallets, keeping {}", total, records.len());
    records
}
