//! Marking report types with JSON persistence and re-mark comparison.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{PartResult, SymbolicAnswer};

/// The outcome of marking every part of one question instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkingReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub question: QuestionSummary,
    /// Seed the question instance was built from.
    pub seed: u64,
    /// Per-part results, in question order.
    pub parts: Vec<PartReport>,
    pub total_marks: f64,
    pub total_score: f64,
}

/// Summary of a question (without its part definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: String,
    pub name: String,
    pub part_count: usize,
}

/// Result of marking one top-level part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartReport {
    pub part_id: String,
    #[serde(flatten)]
    pub result: PartResult,
    pub student_answer: SymbolicAnswer,
    #[serde(default)]
    pub revealed: bool,
}

impl MarkingReport {
    pub fn new(question: QuestionSummary, seed: u64, parts: Vec<PartReport>) -> Self {
        let total_marks = parts.iter().map(|p| p.result.marks).sum();
        let total_score = parts.iter().map(|p| p.result.score()).sum();
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            question,
            seed,
            parts,
            total_marks,
            total_score,
        }
    }

    /// Score as a fraction of the available marks; 0 when nothing is available.
    pub fn fraction(&self) -> f64 {
        if self.total_marks > 0.0 {
            self.total_score / self.total_marks
        } else {
            0.0
        }
    }

    pub fn part(&self, part_id: &str) -> Option<&PartReport> {
        self.parts.iter().find(|p| p.part_id == part_id)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: MarkingReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare against an earlier marking of the same question, part by part.
    ///
    /// Parts whose score moved by more than `threshold` are listed.
    pub fn compare(&self, baseline: &MarkingReport, threshold: f64) -> Vec<ScoreChange> {
        self.parts
            .iter()
            .filter_map(|current| {
                let before = baseline.part(&current.part_id)?;
                let delta = current.result.score() - before.result.score();
                (delta.abs() > threshold).then(|| ScoreChange {
                    part_id: current.part_id.clone(),
                    baseline_score: before.result.score(),
                    current_score: current.result.score(),
                    delta,
                })
            })
            .collect()
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = format!(
            "## {} ({})\n\n**Score:** {:.2} / {:.2}\n\n",
            self.question.name, self.question.id, self.total_score, self.total_marks
        );
        md.push_str("| Part | Answered | Credit | Score |\n");
        md.push_str("|------|----------|--------|-------|\n");
        for p in &self.parts {
            md.push_str(&format!(
                "| {} | {} | {:.0}% | {:.2} / {:.2} |\n",
                p.part_id,
                if p.result.answered { "yes" } else { "no" },
                p.result.credit * 100.0,
                p.result.score(),
                p.result.marks
            ));
        }
        md
    }
}

/// A part whose score changed between two markings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreChange {
    pub part_id: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}
