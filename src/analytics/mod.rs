pub mod aggregator;
pub mod scorer;
pub mod ranker;
pub mod report;

pub use aggregator::{aggregate, WalletFeatures};
pub use scorer::{ScoreBreakdown, ScoreRecord, WalletScorer};
pub use ranker::{rank, rank_order};
pub use report::{ScoreReport, ScoreTable};
