/// Compound V2 subgraph dataset loader

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::validation::{optional_str, required_f64, required_str, RecordError};
use crate::core::{EventType, Transaction};

/// Skipped records logged at warn level per file before dropping to debug
const MAX_WARNINGS_PER_FILE: usize = 5;

/// Outcome of a load: how many records were kept and why others were dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub files: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub skipped_by_reason: BTreeMap<String, usize>,
    pub loaded_by_type: BTreeMap<EventType, usize>,
}

impl LoadReport {
    fn record_skip(&mut self, error: &RecordError) {
        self.skipped += 1;
        *self.skipped_by_reason.entry(error.reason()).or_insert(0) += 1;
    }

    fn record_load(&mut self, event_type: EventType) {
        self.loaded += 1;
        *self.loaded_by_type.entry(event_type).or_insert(0) += 1;
    }
}

/// Loads transaction records from JSON dumps.
///
/// File, JSON and layout problems are fatal. Individual records with missing
/// or malformed fields are skipped and counted in the [`LoadReport`].
pub struct TransactionLoader;

impl TransactionLoader {
    #[instrument(skip_all, fields(files = paths.len()))]
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<(Vec<Transaction>, LoadReport)> {
        if paths.is_empty() {
            bail!("no input files given");
        }

        let mut transactions = Vec::new();
        let mut report = LoadReport::default();

        for path in paths {
            let path = path.as_ref();
            let file_txs = Self::load_file(path, &mut report)?;
            info!("📥 Loaded {} transactions from {}", file_txs.len(), path.display());
            transactions.extend(file_txs);
        }

        info!("Loaded {} transactions by event type: {:?}", report.loaded, report.loaded_by_type);
        if report.skipped > 0 {
            info!(
                "⚠️  Skipped {} malformed records across {} files: {:?}",
                report.skipped, report.files, report.skipped_by_reason
            );
        }

        Ok((transactions, report))
    }

    pub fn load_file(path: &Path, report: &mut LoadReport) -> Result<Vec<Transaction>> {
        let file = File::open(path)
            .with_context(|| format!("failed to open input file {}", path.display()))?;
        let data: Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("input file {} is not valid JSON", path.display()))?;

        report.files += 1;
        Self::parse_dataset(&data, &path.display().to_string(), report)
    }

    /// Extract every known event family from one dataset object.
    pub fn parse_dataset(data: &Value, source: &str, report: &mut LoadReport) -> Result<Vec<Transaction>> {
        let root = match data.as_object() {
            Some(root) => root,
            None => bail!("{}: top-level JSON value must be an object", source),
        };

        // Subgraph query dumps sometimes keep the GraphQL `data` envelope
        let root = match root.get("data").and_then(|d| d.as_object()) {
            Some(inner) if !EventType::ALL.iter().any(|t| t.dataset_keys().iter().any(|k| root.contains_key(*k))) => inner,
            _ => root,
        };

        let mut transactions = Vec::new();
        let mut warnings = 0usize;
        let mut found_any = false;

        for event_type in EventType::ALL {
            for key in event_type.dataset_keys() {
                let Some(section) = root.get(*key) else {
                    continue;
                };
                found_any = true;

                let records = match section.as_array() {
                    Some(records) => records,
                    None => bail!("{}: `{}` must be an array of events", source, key),
                };
                debug!("Parsing {} {} records (`{}`) from {}", records.len(), event_type, key, source);

                for (index, record) in records.iter().enumerate() {
                    match Self::parse_record(event_type, record) {
                        Ok(tx) => {
                            report.record_load(event_type);
                            transactions.push(tx);
                        }
                        Err(e) => {
                            report.record_skip(&e);
                            if warnings < MAX_WARNINGS_PER_FILE {
                                warn!("Skipping {}[{}] in {}: {}", key, index, source, e);
                            } else {
                                debug!("Skipping {}[{}] in {}: {}", key, index, source, e);
                            }
                            warnings += 1;
                        }
                    }
                }
            }
        }

        if !found_any {
            warn!("{} contains no recognised transaction arrays", source);
        }

        Ok(transactions)
    }

    /// Convert one raw event into a transaction.
    pub fn parse_record(event_type: EventType, record: &Value) -> Result<Transaction, RecordError> {
        if !record.is_object() {
            return Err(RecordError::NotAnObject);
        }

        let liquidator = optional_str(record, "liquidator.id");
        let liquidatee = optional_str(record, "liquidatee.id");

        // Liquidation events may omit `account`; the borrower is the subject then
        let wallet = match (event_type, required_str(record, "account.id")) {
            (_, Ok(wallet)) => wallet,
            (EventType::Liquidation, Err(e)) => liquidatee.clone().ok_or(e)?,
            (_, Err(e)) => return Err(e),
        };

        let amount_usd = required_f64(record, "amountUSD")?;
        if amount_usd < 0.0 {
            return Err(RecordError::InvalidValue {
                field: "amountUSD",
                value: amount_usd.to_string(),
            });
        }

        let timestamp = parse_timestamp(required_f64(record, "timestamp")?)?;

        let mut tx = Transaction::new(wallet, event_type, amount_usd, timestamp)
            .with_liquidation_parties(liquidator.as_deref(), liquidatee.as_deref());
        tx.asset_symbol = optional_str(record, "asset.symbol");
        Ok(tx)
    }
}

/// Unix seconds to a UTC instant; fractional seconds are truncated.
fn parse_timestamp(seconds: f64) -> Result<DateTime<Utc>, RecordError> {
    let invalid = || RecordError::InvalidValue {
        field: "timestamp",
        value: seconds.to_string(),
    };

    if seconds < 0.0 || seconds > i64::MAX as f64 {
        return Err(invalid());
    }
    Utc.timestamp_opt(seconds.trunc() as i64, 0).single().ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn deposit(account: &str, amount: &str, ts: &str) -> Value {
        json!({
            "account": {"id": account},
            "amountUSD": amount,
            "timestamp": ts,
            "asset": {"symbol": "USDC"}
        })
    }

    #[test]
    fn test_parse_all_event_families() {
        let data = json!({
            "deposits": [deposit("0xA1", "100.5", "1600000000")],
            "withdraws": [deposit("0xa1", "10", "1600000100")],
            "borrows": [deposit("0xb2", "50", "1600000200")],
            "repayments": [deposit("0xb2", "25", "1600000300")],
            "liquidations": [{
                "amountUSD": 40,
                "timestamp": 1600000400,
                "liquidator": {"id": "0xC3"},
                "liquidatee": {"id": "0xb2"}
            }]
        });

        let mut report = LoadReport::default();
        let txs = TransactionLoader::parse_dataset(&data, "test", &mut report).unwrap();

        assert_eq!(txs.len(), 5);
        assert_eq!(report.loaded, 5);
        assert_eq!(report.skipped, 0);
        assert_eq!(txs[0].wallet, "0xa1");
        assert_eq!(txs[0].amount_usd, 100.5);
        assert_eq!(txs[0].asset_symbol.as_deref(), Some("USDC"));
        assert_eq!(txs[0].timestamp.timestamp(), 1_600_000_000);

        let liquidation = txs.iter().find(|t| t.event_type == EventType::Liquidation).unwrap();
        assert_eq!(liquidation.wallet, "0xb2");
        assert_eq!(liquidation.liquidator.as_deref(), Some("0xc3"));
        assert_eq!(report.loaded_by_type[&EventType::Repay], 1);
    }

    #[test]
    fn test_bad_records_are_skipped_not_fatal() {
        let data = json!({
            "deposits": [
                deposit("0xa1", "100", "1600000000"),
                {"amountUSD": "5", "timestamp": "1600000000"},
                deposit("0xa2", "not-a-number", "1600000000"),
                deposit("0xa3", "5", "yesterday"),
                deposit("0xa4", "-3", "1600000000"),
                "garbage"
            ]
        });

        let mut report = LoadReport::default();
        let txs = TransactionLoader::parse_dataset(&data, "test", &mut report).unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(report.skipped, 5);
        assert_eq!(report.skipped_by_reason["missing_account.id"], 1);
        assert_eq!(report.skipped_by_reason["invalid_amountUSD"], 2);
        assert_eq!(report.skipped_by_reason["invalid_timestamp"], 1);
        assert_eq!(report.skipped_by_reason["not_an_object"], 1);
    }

    #[test]
    fn test_structural_errors_are_fatal() {
        let mut report = LoadReport::default();
        assert!(TransactionLoader::parse_dataset(&json!([1, 2]), "test", &mut report).is_err());
        assert!(TransactionLoader::parse_dataset(&json!({"deposits": {"x": 1}}), "test", &mut report).is_err());
    }

    #[test]
    fn test_liquidation_parties_recorded_independently() {
        let data = json!({
            "liquidations": [
                {
                    "account": {"id": "0xDebtor"},
                    "amountUSD": "40",
                    "timestamp": "1600000400",
                    "liquidator": {"id": "0xKeeper"}
                },
                {
                    "account": {"id": "0xdebtor"},
                    "amountUSD": "10",
                    "timestamp": "1600000500",
                    "liquidatee": {"id": "0xDEBTOR"}
                }
            ]
        });

        let mut report = LoadReport::default();
        let txs = TransactionLoader::parse_dataset(&data, "test", &mut report).unwrap();

        assert_eq!(txs[0].liquidator.as_deref(), Some("0xkeeper"));
        assert_eq!(txs[0].liquidatee, None);
        assert_eq!(txs[1].liquidator, None);
        assert_eq!(txs[1].liquidatee.as_deref(), Some("0xdebtor"));
    }

    #[test]
    fn test_graphql_envelope_unwrapped() {
        let data = json!({"data": {"deposits": [deposit("0xa1", "1", "1600000000")]}});
        let mut report = LoadReport::default();
        let txs = TransactionLoader::parse_dataset(&data, "test", &mut report).unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[test]
    fn test_load_files_from_disk() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, "{}", json!({"deposits": [deposit("0xa1", "1", "1600000000")]})).unwrap();

        let (txs, report) = TransactionLoader::load_files(&[good.path()]).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(report.files, 1);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "{{ not json").unwrap();
        let err = TransactionLoader::load_files(&[good.path(), broken.path()]).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));

        let missing = TransactionLoader::load_files(&[Path::new("/nonexistent/chunk_0.json")]);
        assert!(missing.is_err());

        let none: [&Path; 0] = [];
        assert!(TransactionLoader::load_files(&none).is_err());
    }
}
