use std::fs;
use std::path::Path;

use compound_credit::analytics::{ScoreReport, ScoreTable};
use compound_credit::config::Config;
use compound_credit::export::{ExplainedRow, ScoreRow};
use compound_credit::pipeline::{run, RunOptions};
use serde_json::{json, Value};

const DAY: i64 = 86_400;
const T0: i64 = 1_600_000_000;

fn event(account: &str, amount: f64, ts: i64, symbol: &str) -> Value {
    json!({
        "account": {"id": account},
        "amountUSD": amount.to_string(),
        "timestamp": ts.to_string(),
        "asset": {"symbol": symbol}
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, value.to_string()).unwrap();
    path
}

fn read_rows(path: &Path) -> Vec<ScoreRow> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Steady depositor, bot-like depositor, and a liquidated borrower split
/// across two chunk files, plus one malformed record.
fn fixture(dir: &Path) -> Vec<std::path::PathBuf> {
    let steady: Vec<Value> = (0..10)
        .map(|i| event("0xSTEADY", 5_000.0, T0 + i * 11 * DAY, "DAI"))
        .collect();
    let bot: Vec<Value> = (0..200)
        .map(|i| event("0xb0b", 250.0, T0 + i * (2 * DAY / 200), "USDC"))
        .collect();

    let chunk_0 = json!({
        "deposits": steady,
        "borrows": [event("0xdebtor", 1_000.0, T0, "ETH")],
    });
    let chunk_1 = json!({
        "deposits": bot,
        "repayments": [
            event("0xdebtor", 100.0, T0 + DAY, "ETH"),
            {"account": {"id": "0xbroken"}, "amountUSD": "oops", "timestamp": "1600000000"}
        ],
        "liquidations": [{
            "amountUSD": "800",
            "timestamp": (T0 + 3 * DAY).to_string(),
            "liquidator": {"id": "0xsteady"},
            "liquidatee": {"id": "0xdebtor"}
        }]
    });

    vec![
        write_json(dir, "chunk_0.json", &chunk_0),
        write_json(dir, "chunk_1.json", &chunk_1),
    ]
}

#[test]
fn full_run_ranks_and_writes() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = fixture(dir.path());
    let output = dir.path().join("top_wallets.csv");
    let features_out = dir.path().join("features.csv");

    let summary = run(
        &Config::default(),
        &RunOptions {
            inputs,
            output: output.clone(),
            features_out: Some(features_out.clone()),
        },
    )
    .unwrap();

    assert_eq!(summary.load.files, 2);
    assert_eq!(summary.load.skipped, 1);
    assert_eq!(summary.wallets, 3);
    assert_eq!(summary.written, 3);

    let header = fs::read_to_string(&output).unwrap();
    assert!(header.starts_with("wallet,score\n"));

    let rows = read_rows(&output);
    let wallets: Vec<&str> = rows.iter().map(|r| r.wallet.as_str()).collect();
    assert_eq!(wallets[0], "0xsteady");
    assert!(rows.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(rows.iter().all(|r| r.score <= 100));

    let steady = rows.iter().find(|r| r.wallet == "0xsteady").unwrap();
    let bot = rows.iter().find(|r| r.wallet == "0xb0b").unwrap();
    assert!(steady.score > bot.score);
    assert_eq!(Some(steady.score), summary.top_score);

    let explained: Vec<ExplainedRow> = csv::Reader::from_path(&features_out)
        .unwrap()
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap();
    let debtor = explained.iter().find(|r| r.wallet == "0xdebtor").unwrap();
    assert_eq!(debtor.liquidatee_count, 1);
    assert_eq!(debtor.deposit_count, 0);
    assert!((debtor.liquidation_to_borrow_ratio - 0.8).abs() < 1e-9);
    let steady_features = explained.iter().find(|r| r.wallet == "0xsteady").unwrap();
    assert_eq!(steady_features.liquidator_count, 1);
    assert!((steady_features.span_days - 99.0).abs() < 1e-9);
    assert!(explained.iter().find(|r| r.wallet == "0xb0b").unwrap().bot_capped);
}

#[test]
fn top_n_truncates_output() {
    let dir = tempfile::tempdir().unwrap();
    let deposits: Vec<Value> = (0..30)
        .map(|i| event(&format!("0x{:040x}", i), 100.0 * (i + 1) as f64, T0 + i * DAY, "DAI"))
        .collect();
    let input = write_json(dir.path(), "chunk.json", &json!({ "deposits": deposits }));
    let output = dir.path().join("out.csv");

    let mut config = Config::default();
    config.output.top_n = 10;
    let summary = run(
        &config,
        &RunOptions {
            inputs: vec![input],
            output: output.clone(),
            features_out: None,
        },
    )
    .unwrap();

    assert_eq!(summary.wallets, 30);
    let rows = read_rows(&output);
    assert_eq!(rows.len(), 10);
    for pair in rows.windows(2) {
        assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].wallet < pair[1].wallet));
    }
}

#[test]
fn structural_errors_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let not_object = write_json(dir.path(), "bad.json", &json!([1, 2, 3]));
    let result = run(
        &Config::default(),
        &RunOptions {
            inputs: vec![not_object],
            output: output.clone(),
            features_out: None,
        },
    );
    assert!(result.is_err());
    assert!(!output.exists());

    let only_bad_records = write_json(
        dir.path(),
        "empty.json",
        &json!({"deposits": [{"amountUSD": "1", "timestamp": "1"}]}),
    );
    let result = run(
        &Config::default(),
        &RunOptions {
            inputs: vec![only_bad_records],
            output: output.clone(),
            features_out: None,
        },
    );
    assert!(result.unwrap_err().to_string().contains("no valid transactions"));
}

#[test]
fn report_over_written_scores() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = fixture(dir.path());
    let output = dir.path().join("top_wallets.csv");
    let features_out = dir.path().join("features.csv");

    run(
        &Config::default(),
        &RunOptions {
            inputs,
            output: output.clone(),
            features_out: Some(features_out.clone()),
        },
    )
    .unwrap();

    let scores = ScoreTable::from_path(&output).unwrap();
    let features = ScoreTable::from_path(&features_out).unwrap();
    let report = ScoreReport::build(&scores, Some(&features)).unwrap();

    assert_eq!(report.summary.count, 3);
    assert_eq!(report.top[0].0, "0xsteady");
    assert!(report.correlations.iter().any(|(name, _)| name == "deposits_per_day"));
}
