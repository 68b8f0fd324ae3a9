pub mod writer;

pub use writer::{write_scores, write_scores_to, ExplainedRow, ScoreRow};
