/// Rule-based wallet credit scoring

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::aggregator::WalletFeatures;
use crate::config::{tier_points, ConfigError, RuleTable};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Points contributed by each rule, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub deposit_points: f64,
    pub span_points: f64,
    pub frequency_points: f64,
    pub avg_amount_points: f64,
    pub diversity_points: f64,
    pub liquidation_ratio_points: f64,
    pub liquidatee_points: f64,
    pub liquidator_points: f64,

    /// Whether the automated-wallet ceiling lowered the running score
    pub bot_capped: bool,

    /// Running score after all rules, before clamping
    pub raw: f64,
}

impl ScoreBreakdown {
    /// Clamp to [0, 100] and round half away from zero
    pub fn final_score(&self) -> u8 {
        if self.raw.is_nan() {
            return 0;
        }
        self.raw.clamp(MIN_SCORE, MAX_SCORE).round() as u8
    }
}

/// A wallet's score together with what produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub wallet: String,
    pub score: u8,
    pub features: WalletFeatures,
    pub breakdown: ScoreBreakdown,
}

pub struct WalletScorer {
    rules: RuleTable,
}

impl WalletScorer {
    pub fn new(rules: RuleTable) -> Result<Self, ConfigError> {
        rules.validate()?;
        Ok(Self { rules })
    }

    /// Evaluate every rule against one wallet's features.
    pub fn explain(&self, features: &WalletFeatures) -> ScoreBreakdown {
        let rules = &self.rules;
        let mut b = ScoreBreakdown {
            base: rules.base_score,
            ..Default::default()
        };

        b.deposit_points = tier_points(&rules.deposit_tiers, features.total_deposits_usd);
        b.span_points = tier_points(&rules.span_tiers, features.span_days);
        b.frequency_points = tier_points(&rules.frequency_tiers, features.deposits_per_day);

        b.avg_amount_points = (features.mean_amount_usd / rules.avg_amount_divisor).clamp(0.0, rules.avg_amount_cap);
        b.diversity_points = capped(features.distinct_assets as f64 * rules.points_per_asset, rules.asset_diversity_cap);

        b.liquidation_ratio_points = -(features.liquidation_to_borrow_ratio * rules.liquidation_ratio_weight);
        b.liquidatee_points = -(features.liquidatee_count as f64 * rules.liquidatee_penalty);
        b.liquidator_points = capped(features.liquidator_count as f64 * rules.liquidator_reward, rules.liquidator_reward_cap);

        let mut running = b.base
            + b.deposit_points
            + b.span_points
            + b.frequency_points
            + b.avg_amount_points
            + b.diversity_points
            + b.liquidation_ratio_points
            + b.liquidatee_points
            + b.liquidator_points;

        if features.deposits_per_day >= rules.bot_deposits_per_day && running > rules.bot_score_cap {
            running = rules.bot_score_cap;
            b.bot_capped = true;
        }

        b.raw = running;
        b
    }

    pub fn score(&self, features: &WalletFeatures) -> u8 {
        self.explain(features).final_score()
    }

    pub fn score_wallet(&self, features: WalletFeatures) -> ScoreRecord {
        let breakdown = self.explain(&features);
        let score = breakdown.final_score();
        if breakdown.bot_capped {
            debug!(
                "Wallet {} capped at {} ({:.1} deposits/day)",
                features.wallet, score, features.deposits_per_day
            );
        }
        ScoreRecord {
            wallet: features.wallet.clone(),
            score,
            features,
            breakdown,
        }
    }

    /// Score wallets in parallel; output order is unspecified until ranked.
    #[instrument(skip_all)]
    pub fn score_all<I>(&self, features: I) -> Vec<ScoreRecord>
    where
        I: IntoParallelIterator<Item = WalletFeatures>,
    {
        features
            .into_par_iter()
            .map(|f| self.score_wallet(f))
            .collect()
    }
}

fn capped(points: f64, cap: Option<f64>) -> f64 {
    match cap {
        Some(cap) => points.min(cap),
        None => points,
    }
}
