//! Compiler configuration.
//!
//! Every field has a default, so a config file only needs to list what it
//! changes:
//!
//! ```json
//! { "rewrite_plain_or": true, "expansion_timeout_ms": 500 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Prefix generated patterns with `(?i)`. Raw patterns are left alone.
    pub case_insensitive: bool,
    /// Collapse plain OR groups (no negation) into one pattern clause too,
    /// instead of emitting an explicit disjunction.
    pub rewrite_plain_or: bool,
    /// Upper bound on conditions per request, across all groups and sides.
    pub max_conditions: usize,
    /// Budget for one call to the expansion service.
    pub expansion_timeout_ms: u64,
    /// Extra terms kept per expanded condition.
    pub max_expansions_per_term: usize,
    /// Exclude journal pages when the request does not say otherwise.
    pub exclude_journals: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            rewrite_plain_or: false,
            max_conditions: 64,
            expansion_timeout_ms: 1500,
            max_expansions_per_term: 5,
            exclude_journals: false,
        }
    }
}

impl CompilerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_conditions == 0 {
            return Err(ConfigError::Invalid(
                "max_conditions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn expansion_timeout(&self) -> Duration {
        Duration::from_millis(self.expansion_timeout_ms)
    }
}
