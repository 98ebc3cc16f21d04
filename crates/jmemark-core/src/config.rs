//! Marking defaults, loaded from `jmemark.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{CheckingConfig, CheckingType, SampleDistribution};

/// File name searched for in the current directory.
pub const CONFIG_FILE_NAME: &str = "jmemark.toml";

/// Defaults applied to parts that don't set their own values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingConfig {
    #[serde(default = "default_checking_type")]
    pub checking_type: CheckingType,
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
    #[serde(default)]
    pub max_failures: u32,
    #[serde(default = "default_range")]
    pub range: [f64; 2],
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub distribution: SampleDistribution,
    /// Marks for a part that doesn't state them.
    #[serde(default = "default_marks")]
    pub default_marks: f64,
    /// Simplification rule set for answers that don't state one.
    #[serde(default)]
    pub simplification: String,
    /// Fixed seed used when neither the question nor the caller sets one.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_checking_type() -> CheckingType {
    CheckingType::RelDiff
}
fn default_accuracy() -> f64 {
    0.0001
}
fn default_range() -> [f64; 2] {
    [0.0, 1.0]
}
fn default_points() -> u32 {
    5
}
fn default_marks() -> f64 {
    1.0
}

impl Default for MarkingConfig {
    fn default() -> Self {
        Self {
            checking_type: default_checking_type(),
            accuracy: default_accuracy(),
            max_failures: 0,
            range: default_range(),
            points: default_points(),
            distribution: SampleDistribution::Uniform,
            default_marks: default_marks(),
            simplification: String::new(),
            seed: None,
        }
    }
}

impl MarkingConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse marking config")
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Load from an explicit path, or `jmemark.toml` in the current directory
    /// if it exists, or fall back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("config file not found: {}", p.display());
                }
                Self::load(p)
            }
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::load(&local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The checking settings a part gets when it doesn't override them.
    pub fn checking(&self) -> CheckingConfig {
        CheckingConfig {
            checking_type: self.checking_type,
            accuracy: self.accuracy,
            max_failures: self.max_failures,
            range_start: self.range[0],
            range_end: self.range[1],
            points: self.points,
            distribution: self.distribution,
        }
    }

    /// Render as TOML, as written by `jmemark init`.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize marking config")
    }
}
