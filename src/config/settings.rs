/// Run configuration structures

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::RuleTable;

pub const DEFAULT_TOP_N: usize = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub rules: RuleTable,
    pub output: Output,
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Output {
    /// Maximum number of ranked wallets written
    pub top_n: usize,

    /// Append the feature columns to every output row
    pub explain: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            explain: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Directory for the rolling JSON log file
    pub directory: String,
    pub file_prefix: String,

    /// Filter used when RUST_LOG is unset
    pub default_filter: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "compound-credit.log".to_string(),
            default_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.rules.validate().context("invalid [rules] table")?;
        if self.output.top_n == 0 {
            anyhow::bail!("output.top_n must be at least 1");
        }
        Ok(())
    }
}
