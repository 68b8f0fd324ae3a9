/// Configuration: scoring rule table and run settings

pub mod rules;
pub mod settings;

pub use rules::*;
pub use settings::*;
