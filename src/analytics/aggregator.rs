/// Per-wallet feature aggregation

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::{EventType, Transaction};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Behavioral features of one wallet, derived from all of its transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletFeatures {
    pub wallet: String,

    /// Sum of deposit amounts in USD
    pub total_deposits_usd: f64,
    pub deposit_count: u64,

    pub first_activity: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    /// Days between first and last activity, fractional and not floored:
    /// a single-event wallet reports 0 here. The 1-day floor applies only
    /// to the `deposits_per_day` denominator.
    pub span_days: f64,

    /// deposit_count / max(span_days, 1)
    pub deposits_per_day: f64,

    pub transaction_count: u64,
    pub total_amount_usd: f64,
    pub mean_amount_usd: f64,

    /// Sample standard deviation of all amounts, 0 with fewer than two transactions
    pub std_amount_usd: f64,

    pub distinct_assets: u64,
    pub borrow_total_usd: f64,
    pub liquidation_total_usd: f64,

    /// liquidation_total_usd / borrow_total_usd (see [`liquidation_ratio`])
    pub liquidation_to_borrow_ratio: f64,

    /// Liquidations this wallet performed
    pub liquidator_count: u64,

    /// Liquidations this wallet suffered
    pub liquidatee_count: u64,
}

/// Running state for one wallet while the full pass is in progress
#[derive(Debug)]
struct WalletAccumulator {
    total_deposits_usd: f64,
    deposit_count: u64,
    first_activity: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    transaction_count: u64,
    total_amount_usd: f64,
    // Welford running mean / sum of squared deviations
    mean: f64,
    m2: f64,
    assets: AHashSet<String>,
    borrow_total_usd: f64,
    liquidation_total_usd: f64,
}

impl WalletAccumulator {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            total_deposits_usd: 0.0,
            deposit_count: 0,
            first_activity: timestamp,
            last_activity: timestamp,
            transaction_count: 0,
            total_amount_usd: 0.0,
            mean: 0.0,
            m2: 0.0,
            assets: AHashSet::new(),
            borrow_total_usd: 0.0,
            liquidation_total_usd: 0.0,
        }
    }

    fn add(&mut self, tx: &Transaction) {
        self.first_activity = self.first_activity.min(tx.timestamp);
        self.last_activity = self.last_activity.max(tx.timestamp);

        self.transaction_count += 1;
        self.total_amount_usd += tx.amount_usd;
        let delta = tx.amount_usd - self.mean;
        self.mean += delta / self.transaction_count as f64;
        self.m2 += delta * (tx.amount_usd - self.mean);

        if let Some(symbol) = &tx.asset_symbol {
            if !self.assets.contains(symbol) {
                self.assets.insert(symbol.clone());
            }
        }

        match tx.event_type {
            EventType::Deposit => {
                self.deposit_count += 1;
                self.total_deposits_usd += tx.amount_usd;
            }
            EventType::Borrow => self.borrow_total_usd += tx.amount_usd,
            EventType::Liquidation => self.liquidation_total_usd += tx.amount_usd,
            EventType::Withdraw | EventType::Repay => {}
        }
    }

    fn finish(self, wallet: String, roles: Option<&LiquidationRoles>) -> WalletFeatures {
        let span_days = (self.last_activity - self.first_activity).num_seconds() as f64 / SECONDS_PER_DAY;
        let std_amount_usd = if self.transaction_count > 1 {
            (self.m2 / (self.transaction_count - 1) as f64).max(0.0).sqrt()
        } else {
            0.0
        };
        let roles = roles.copied().unwrap_or_default();

        WalletFeatures {
            wallet,
            total_deposits_usd: self.total_deposits_usd,
            deposit_count: self.deposit_count,
            first_activity: self.first_activity,
            last_activity: self.last_activity,
            span_days,
            deposits_per_day: self.deposit_count as f64 / span_days.max(1.0),
            transaction_count: self.transaction_count,
            total_amount_usd: self.total_amount_usd,
            mean_amount_usd: self.mean,
            std_amount_usd,
            distinct_assets: self.assets.len() as u64,
            borrow_total_usd: self.borrow_total_usd,
            liquidation_total_usd: self.liquidation_total_usd,
            liquidation_to_borrow_ratio: liquidation_ratio(self.liquidation_total_usd, self.borrow_total_usd),
            liquidator_count: roles.liquidator,
            liquidatee_count: roles.liquidatee,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LiquidationRoles {
    liquidator: u64,
    liquidatee: u64,
}

/// Liquidated volume relative to borrowed volume.
///
/// No borrows and no liquidations is 0. Liquidations without any recorded
/// borrow count as a full default (1.0) rather than an unbounded ratio.
pub fn liquidation_ratio(liquidated_usd: f64, borrowed_usd: f64) -> f64 {
    if borrowed_usd > 0.0 {
        liquidated_usd / borrowed_usd
    } else if liquidated_usd > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Group transactions by wallet and reduce each group to its features.
///
/// This is a full pass: no wallet is finalized until every transaction has
/// been consumed. Liquidator / liquidatee counts are only attached to wallets
/// that own at least one transaction.
#[instrument(skip_all, fields(transactions = transactions.len()))]
pub fn aggregate(transactions: &[Transaction]) -> AHashMap<String, WalletFeatures> {
    let mut wallets: AHashMap<&str, WalletAccumulator> = AHashMap::new();
    let mut roles: AHashMap<&str, LiquidationRoles> = AHashMap::new();

    for tx in transactions {
        wallets
            .entry(tx.wallet.as_str())
            .or_insert_with(|| WalletAccumulator::new(tx.timestamp))
            .add(tx);

        if tx.event_type == EventType::Liquidation {
            if let Some(liquidator) = &tx.liquidator {
                roles.entry(liquidator.as_str()).or_default().liquidator += 1;
            }
            if let Some(liquidatee) = &tx.liquidatee {
                roles.entry(liquidatee.as_str()).or_default().liquidatee += 1;
            }
        }
    }

    let features: AHashMap<String, WalletFeatures> = wallets
        .into_iter()
        .map(|(wallet, acc)| {
            let features = acc.finish(wallet.to_string(), roles.get(wallet));
            (features.wallet.clone(), features)
        })
        .collect();

    debug!("Aggregated {} transactions into {} wallets", transactions.len(), features.len());
    features
}
