/// Scoring rule table: every threshold and point value the scorer uses

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rule table validation errors
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Tier thresholds for {table} must be finite and strictly ascending (at index {index})")]
    UnorderedTiers { table: &'static str, index: usize },

    #[error("Invalid rule value: {field} = {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// One bucket of a tiered rule.
///
/// A tier applies when the measured feature is at or above `threshold`;
/// only the highest applicable tier of a table contributes its points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub threshold: f64,
    pub points: f64,
}

impl Tier {
    pub const fn new(threshold: f64, points: f64) -> Self {
        Self { threshold, points }
    }
}

/// Points for the highest tier whose threshold is at or below `value`.
pub fn tier_points(tiers: &[Tier], value: f64) -> f64 {
    tiers
        .iter()
        .take_while(|tier| tier.threshold <= value)
        .last()
        .map(|tier| tier.points)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    /// Starting score before any rule fires
    pub base_score: f64,

    /// Total deposited USD buckets (reward)
    pub deposit_tiers: Vec<Tier>,

    /// Activity span buckets in days (reward)
    pub span_tiers: Vec<Tier>,

    /// Deposits-per-day buckets (penalty, points are negative)
    pub frequency_tiers: Vec<Tier>,

    /// Mean transaction USD is divided by this before capping
    pub avg_amount_divisor: f64,
    pub avg_amount_cap: f64,

    /// Points per distinct asset symbol
    pub points_per_asset: f64,

    /// Ceiling on the diversity reward; unbounded when absent
    pub asset_diversity_cap: Option<f64>,

    /// Multiplier for liquidated-USD / borrowed-USD
    pub liquidation_ratio_weight: f64,

    /// Points removed per liquidation suffered
    pub liquidatee_penalty: f64,

    /// Points added per liquidation performed
    pub liquidator_reward: f64,

    /// Ceiling on the liquidator reward; unbounded when absent
    pub liquidator_reward_cap: Option<f64>,

    /// Deposits per day at which a wallet is treated as automated
    pub bot_deposits_per_day: f64,

    /// Ceiling applied to automated wallets before clamping
    pub bot_score_cap: f64,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            base_score: 50.0,
            deposit_tiers: vec![
                Tier::new(1_000.0, 5.0),
                Tier::new(10_000.0, 10.0),
                Tier::new(100_000.0, 15.0),
                Tier::new(1_000_000.0, 20.0),
            ],
            span_tiers: vec![
                Tier::new(7.0, 2.0),
                Tier::new(30.0, 5.0),
                Tier::new(90.0, 10.0),
                Tier::new(365.0, 15.0),
            ],
            frequency_tiers: vec![
                Tier::new(5.0, -5.0),
                Tier::new(20.0, -15.0),
                Tier::new(50.0, -30.0),
            ],
            avg_amount_divisor: 1.0,
            avg_amount_cap: 20.0,
            points_per_asset: 2.0,
            asset_diversity_cap: None,
            liquidation_ratio_weight: 30.0,
            liquidatee_penalty: 5.0,
            liquidator_reward: 2.0,
            liquidator_reward_cap: None,
            bot_deposits_per_day: 50.0,
            bot_score_cap: 40.0,
        }
    }
}

impl RuleTable {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_tiers("deposit_tiers", &self.deposit_tiers)?;
        check_tiers("span_tiers", &self.span_tiers)?;
        check_tiers("frequency_tiers", &self.frequency_tiers)?;

        if !self.base_score.is_finite() {
            return Err(ConfigError::InvalidValue { field: "base_score", value: self.base_score });
        }
        if !(self.avg_amount_divisor > 0.0) {
            return Err(ConfigError::InvalidValue { field: "avg_amount_divisor", value: self.avg_amount_divisor });
        }

        for (field, value) in [
            ("avg_amount_cap", self.avg_amount_cap),
            ("points_per_asset", self.points_per_asset),
            ("liquidation_ratio_weight", self.liquidation_ratio_weight),
            ("liquidatee_penalty", self.liquidatee_penalty),
            ("liquidator_reward", self.liquidator_reward),
            ("bot_deposits_per_day", self.bot_deposits_per_day),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        for (field, cap) in [
            ("asset_diversity_cap", self.asset_diversity_cap),
            ("liquidator_reward_cap", self.liquidator_reward_cap),
        ] {
            if let Some(value) = cap {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidValue { field, value });
                }
            }
        }

        if !(0.0..=100.0).contains(&self.bot_score_cap) {
            return Err(ConfigError::InvalidValue { field: "bot_score_cap", value: self.bot_score_cap });
        }

        Ok(())
    }
}

fn check_tiers(table: &'static str, tiers: &[Tier]) -> Result<(), ConfigError> {
    for (index, tier) in tiers.iter().enumerate() {
        if !tier.threshold.is_finite() || !tier.points.is_finite() {
            return Err(ConfigError::UnorderedTiers { table, index });
        }
        if index > 0 && tier.threshold <= tiers[index - 1].threshold {
            return Err(ConfigError::UnorderedTiers { table, index });
        }
    }
    Ok(())
}
