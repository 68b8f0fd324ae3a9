/// Transaction dataset ingestion

pub mod loader;
pub mod validation;

pub use loader::{LoadReport, TransactionLoader};
pub use validation::RecordError;
