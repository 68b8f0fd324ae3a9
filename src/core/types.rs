/// Core data types for Compound V2 wallet scoring
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compound V2 protocol event families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    Liquidation,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::Deposit,
        EventType::Withdraw,
        EventType::Borrow,
        EventType::Repay,
        EventType::Liquidation,
    ];

    /// Top-level dataset keys that hold events of this type.
    ///
    /// Subgraph dumps are not consistent about naming, so both the schema
    /// entity plural and the longer form are accepted.
    pub fn dataset_keys(&self) -> &'static [&'static str] {
        match self {
            EventType::Deposit => &["deposits"],
            EventType::Withdraw => &["withdraws", "withdrawals"],
            EventType::Borrow => &["borrows"],
            EventType::Repay => &["repays", "repayments"],
            EventType::Liquidation => &["liquidates", "liquidations"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Deposit => "deposit",
            EventType::Withdraw => "withdraw",
            EventType::Borrow => "borrow",
            EventType::Repay => "repay",
            EventType::Liquidation => "liquidation",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol event attributed to one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Wallet address (lowercased hex)
    pub wallet: String,

    pub event_type: EventType,

    /// Amount in USD at the time of the event
    pub amount_usd: f64,

    pub timestamp: DateTime<Utc>,

    /// Underlying asset symbol, when the dataset carries one
    pub asset_symbol: Option<String>,

    /// Liquidator address (liquidation events only)
    pub liquidator: Option<String>,

    /// Liquidated borrower address (liquidation events only)
    pub liquidatee: Option<String>,
}

impl Transaction {
    pub fn new(wallet: impl Into<String>, event_type: EventType, amount_usd: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            wallet: normalize_address(&wallet.into()),
            event_type,
            amount_usd,
            timestamp,
            asset_symbol: None,
            liquidator: None,
            liquidatee: None,
        }
    }

    pub fn with_asset(mut self, symbol: impl Into<String>) -> Self {
        self.asset_symbol = Some(symbol.into());
        self
    }

    /// Either party may be absent; each one present is normalized on its own.
    pub fn with_liquidation_parties(mut self, liquidator: Option<&str>, liquidatee: Option<&str>) -> Self {
        self.liquidator = liquidator.map(normalize_address);
        self.liquidatee = liquidatee.map(normalize_address);
        self
    }
}

/// Ethereum addresses are case-insensitive; checksummed and plain forms must group together.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Shorten an address for log output
pub fn shorten_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        address.to_string()
    } else {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    }
}
