//! Batch configuration
//!
//! Every field has a default matching the reference behavior, so an empty
//! JSON object (or no config file at all) reproduces it exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest number of fractional digits that still carries information for f64
pub const MAX_PRECISION: usize = 17;

/// What to do when a pair references a file that cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFilePolicy {
    /// Stop the batch with an error after writing the scores before it
    #[default]
    Fail,
    /// Skip the pair with a diagnostic; the output has one line fewer
    Skip,
}

/// Output line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One decimal score per line
    #[default]
    Text,
    /// One JSON object per line with both paths and the score
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    pub missing_files: MissingFilePolicy,
    /// Worker threads for scoring; `0` uses every core, `1` stays on the caller's thread
    pub jobs: usize,
    pub format: OutputFormat,
    /// Fixed number of fractional digits; shortest round-trip form when unset
    pub precision: Option<usize>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        CompareConfig {
            missing_files: MissingFilePolicy::Fail,
            jobs: 1,
            format: OutputFormat::Text,
            precision: None,
        }
    }
}

impl CompareConfig {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: CompareConfig = serde_json::from_str(text)
            .map_err(|e| Error::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(precision) = self.precision {
            if precision > MAX_PRECISION {
                return Err(Error::ConfigError(format!(
                    "precision {} exceeds maximum of {}",
                    precision, MAX_PRECISION
                )));
            }
        }
        Ok(())
    }

    /// Render a score the way this config writes it
    pub fn format_score(&self, score: f64) -> String {
        match self.precision {
            Some(digits) => format!("{:.*}", digits, score),
            None => format!("{:?}", score),
        }
    }
}
