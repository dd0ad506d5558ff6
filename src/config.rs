use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{ExchangeBoard, Pair, SamePairRule};

/// Board description as stored in a TOML file
///
/// ```toml
/// rule = "must-be-compatible"
///
/// [[pairs]]
/// donor = "O"
/// recipient = "A"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BoardConfig {
    #[serde(default)]
    pub rule: Option<SamePairRule>,
    #[serde(default)]
    pub pairs: Vec<Pair>,
}

impl BoardConfig {
    pub fn from_file(path: &Path) -> ExchangeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ExchangeError::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        let config = Self::from_toml(&content)?;
        debug!(
            "Loaded {} pairs from {}",
            config.pairs.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ExchangeResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides.
    ///
    /// Pairs given on the command line replace the file's pairs wholesale;
    /// a rule given on the command line replaces the file's rule.
    pub fn merged(mut self, pairs: &[Pair], rule: Option<SamePairRule>) -> Self {
        if !pairs.is_empty() {
            self.pairs = pairs.to_vec();
        }
        if rule.is_some() {
            self.rule = rule;
        }
        self
    }

    pub fn rule(&self) -> SamePairRule {
        self.rule.unwrap_or_default()
    }

    pub fn board(&self) -> ExchangeResult<ExchangeBoard> {
        ExchangeBoard::new(self.pairs.clone())
    }
}
