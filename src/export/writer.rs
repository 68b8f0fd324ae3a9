/// CSV output for ranked wallet scores

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::ScoreRecord;

/// Minimal output row: `wallet,score`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub wallet: String,
    pub score: u8,
}

/// Output row carrying the features behind the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainedRow {
    pub wallet: String,
    pub score: u8,
    pub total_deposits_usd: f64,
    pub deposit_count: u64,
    pub span_days: f64,
    pub deposits_per_day: f64,
    pub first_activity: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub transaction_count: u64,
    pub mean_amount_usd: f64,
    pub std_amount_usd: f64,
    pub distinct_assets: u64,
    pub borrow_total_usd: f64,
    pub liquidation_total_usd: f64,
    pub liquidation_to_borrow_ratio: f64,
    pub liquidator_count: u64,
    pub liquidatee_count: u64,
    pub bot_capped: bool,
}

impl From<&ScoreRecord> for ScoreRow {
    fn from(record: &ScoreRecord) -> Self {
        Self {
            wallet: record.wallet.clone(),
            score: record.score,
        }
    }
}

impl From<&ScoreRecord> for ExplainedRow {
    fn from(record: &ScoreRecord) -> Self {
        let f = &record.features;
        Self {
            wallet: record.wallet.clone(),
            score: record.score,
            total_deposits_usd: f.total_deposits_usd,
            deposit_count: f.deposit_count,
            span_days: f.span_days,
            deposits_per_day: f.deposits_per_day,
            first_activity: f.first_activity,
            last_activity: f.last_activity,
            transaction_count: f.transaction_count,
            mean_amount_usd: f.mean_amount_usd,
            std_amount_usd: f.std_amount_usd,
            distinct_assets: f.distinct_assets,
            borrow_total_usd: f.borrow_total_usd,
            liquidation_total_usd: f.liquidation_total_usd,
            liquidation_to_borrow_ratio: f.liquidation_to_borrow_ratio,
            liquidator_count: f.liquidator_count,
            liquidatee_count: f.liquidatee_count,
            bot_capped: record.breakdown.bot_capped,
        }
    }
}

/// Write records in the given order. The header row is always present,
/// even when there are no records.
pub fn write_scores_to<W: Write>(writer: W, records: &[ScoreRecord], explain: bool) -> Result<usize> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    if explain {
        csv_writer.write_record(EXPLAINED_HEADER)?;
        for record in records {
            csv_writer.serialize(ExplainedRow::from(record))?;
        }
    } else {
        csv_writer.write_record(SCORE_HEADER)?;
        for record in records {
            csv_writer.serialize(ScoreRow::from(record))?;
        }
    }

    csv_writer.flush()?;
    Ok(records.len())
}

pub fn write_scores(path: &Path, records: &[ScoreRecord], explain: bool) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    write_scores_to(file, records, explain)
        .with_context(|| format!("failed to write scores to {}", path.display()))
}

pub const SCORE_HEADER: [&str; 2] = ["wallet", "score"];

pub const EXPLAINED_HEADER: [&str; 18] = [
    "wallet",
    "score",
    "total_deposits_usd",
    "deposit_count",
    "span_days",
    "deposits_per_day",
    "first_activity",
    "last_activity",
    "transaction_count",
    "mean_amount_usd",
    "std_amount_usd",
    "distinct_assets",
    "borrow_total_usd",
    "liquidation_total_usd",
    "liquidation_to_borrow_ratio",
    "liquidator_count",
    "liquidatee_count",
    "bot_capped",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{aggregate, WalletScorer};
    use crate::config::RuleTable;
    use crate::core::{EventType, Transaction};
    use chrono::TimeZone;

    fn records() -> Vec<ScoreRecord> {
        let ts = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let txs = vec![
            Transaction::new("0xaa", EventType::Deposit, 20_000.0, ts),
            Transaction::new("0xbb", EventType::Borrow, 10.0, ts),
        ];
        let scorer = WalletScorer::new(RuleTable::default()).unwrap();
        let mut records = scorer.score_all(aggregate(&txs).into_values().collect::<Vec<_>>());
        records.sort_by(|a, b| a.wallet.cmp(&b.wallet));
        records
    }

    #[test]
    fn test_plain_output() {
        let mut buf = Vec::new();
        let written = write_scores_to(&mut buf, &records(), false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(written, 2);
        assert_eq!(lines[0], "wallet,score");
        assert!(lines[1].starts_with("0xaa,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_explained_output_header_matches_rows() {
        let mut buf = Vec::new();
        write_scores_to(&mut buf, &records(), true).unwrap();

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, EXPLAINED_HEADER);

        let rows: Vec<ExplainedRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].deposit_count, 1);
        assert_eq!(rows[0].total_deposits_usd, 20_000.0);
        assert_eq!(rows[1].borrow_total_usd, 10.0);
    }

    #[test]
    fn test_empty_output_keeps_header() {
        let mut buf = Vec::new();
        write_scores_to(&mut buf, &[], false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "wallet,score\n");
    }
}
