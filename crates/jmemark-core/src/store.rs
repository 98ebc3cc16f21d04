//! Persistence of staged student answers.
//!
//! Parts read a stored answer once, when an attempt is resumed, to
//! pre-populate their staged answer before the first mark.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A previously saved answer for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnswer {
    pub student_answer: String,
}

/// Source of saved answers, keyed by part id (`p0`, `p1g2`, ...).
pub trait AnswerStore {
    fn load(&self, part_id: &str) -> Option<StoredAnswer>;
}

/// Answers kept in a flat JSON object: `{ "p0": "x^2", "p1g0": "2x" }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonAnswerStore {
    answers: BTreeMap<String, String>,
}

impl JsonAnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse answers from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse answers JSON")
    }

    /// Load answers from a JSON file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read answers from {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("invalid answers file: {}", path.display()))
    }

    /// Write answers as pretty JSON.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize answers")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write answers to {}", path.display()))
    }

    pub fn insert(&mut self, part_id: impl Into<String>, answer: impl Into<String>) {
        self.answers.insert(part_id.into(), answer.into());
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.answers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl AnswerStore for JsonAnswerStore {
    fn load(&self, part_id: &str) -> Option<StoredAnswer> {
        self.answers.get(part_id).map(|a| StoredAnswer {
            student_answer: a.clone(),
        })
    }
}
