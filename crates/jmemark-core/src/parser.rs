//! TOML question parser.
//!
//! Loads question definitions from TOML files and directories, and validates
//! them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::MarkingConfig;
use crate::model::{
    CheckingConfig, CheckingType, ExpressionPartSettings, LengthLimit, PartDef, QuestionDef,
    SampleDistribution, StringRequirement, ValidationPolicy, VariableDef,
};
use crate::part::{gap_path, part_path};
use crate::scope::normalize_name;

/// Intermediate TOML structure for parsing question files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question: TomlQuestionHeader,
    #[serde(default)]
    variables: Vec<TomlVariable>,
    #[serde(default)]
    parts: Vec<TomlPart>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlVariable {
    name: String,
    definition: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TomlPart {
    Jme(TomlJmePart),
    GapFill {
        #[serde(default)]
        gaps: Vec<TomlPart>,
    },
}

#[derive(Debug, Deserialize)]
struct TomlJmePart {
    #[serde(default)]
    marks: Option<f64>,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    simplification: Option<String>,
    #[serde(default)]
    checking: Option<TomlChecking>,
    #[serde(default)]
    min_length: Option<LengthLimit>,
    #[serde(default)]
    max_length: Option<LengthLimit>,
    #[serde(default)]
    must_have: Option<StringRequirement>,
    #[serde(default)]
    not_allowed: Option<StringRequirement>,
    #[serde(default)]
    expected_variable_names: Vec<String>,
    #[serde(default)]
    check_variable_names: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TomlChecking {
    #[serde(default, rename = "type")]
    checking_type: Option<String>,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    max_failures: Option<u32>,
    #[serde(default)]
    range: Option<[f64; 2]>,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    distribution: Option<SampleDistribution>,
}

impl TomlChecking {
    fn resolve(self, config: &MarkingConfig) -> Result<CheckingConfig> {
        let defaults = config.checking();
        let checking_type = match self.checking_type {
            Some(t) => t
                .parse::<CheckingType>()
                .map_err(|e: String| anyhow::anyhow!("{}", e))?,
            None => defaults.checking_type,
        };
        let [range_start, range_end] = self
            .range
            .unwrap_or([defaults.range_start, defaults.range_end]);
        Ok(CheckingConfig {
            checking_type,
            accuracy: self.accuracy.unwrap_or(defaults.accuracy),
            max_failures: self.max_failures.unwrap_or(defaults.max_failures),
            range_start,
            range_end,
            points: self.points.unwrap_or(defaults.points),
            distribution: self.distribution.unwrap_or(defaults.distribution),
        })
    }
}

impl TomlPart {
    fn resolve(self, config: &MarkingConfig) -> Result<PartDef> {
        match self {
            TomlPart::Jme(p) => {
                let checking = p.checking.unwrap_or_default().resolve(config)?;
                Ok(PartDef::Jme(ExpressionPartSettings {
                    marks: p.marks.unwrap_or(config.default_marks),
                    answer: p.answer,
                    simplification: p
                        .simplification
                        .unwrap_or_else(|| config.simplification.clone()),
                    checking,
                    validation: ValidationPolicy {
                        min_length: p.min_length,
                        max_length: p.max_length,
                        must_have: p.must_have,
                        not_allowed: p.not_allowed,
                        expected_variable_names: p
                            .expected_variable_names
                            .iter()
                            .map(|n| normalize_name(n))
                            .collect(),
                        check_variable_names: p.check_variable_names,
                    },
                }))
            }
            TomlPart::GapFill { gaps } => Ok(PartDef::GapFill {
                gaps: gaps
                    .into_iter()
                    .map(|g| g.resolve(config))
                    .collect::<Result<Vec<_>>>()?,
            }),
        }
    }
}

/// Parse a single TOML file into a `QuestionDef`.
pub fn parse_question(path: &Path, config: &MarkingConfig) -> Result<QuestionDef> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question file: {}", path.display()))?;

    parse_question_str(&content, path, config)
}

/// Parse a TOML string into a `QuestionDef` (useful for testing).
pub fn parse_question_str(
    content: &str,
    source_path: &Path,
    config: &MarkingConfig,
) -> Result<QuestionDef> {
    let parsed: TomlQuestionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let parts = parsed
        .parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            p.resolve(config)
                .with_context(|| format!("invalid part {}", part_path(i)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionDef {
        id: parsed.question.id,
        name: parsed.question.name,
        description: parsed.question.description,
        variables: parsed
            .variables
            .into_iter()
            .map(|v| VariableDef {
                name: v.name,
                definition: v.definition,
            })
            .collect(),
        parts,
        seed: parsed.question.seed,
    })
}

/// Recursively load all `.toml` question files from a directory.
pub fn load_question_directory(dir: &Path, config: &MarkingConfig) -> Result<Vec<QuestionDef>> {
    let mut questions = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            questions.extend(load_question_directory(&path, config)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question(&path, config) {
                Ok(q) => questions.push(q),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(questions)
}

/// A warning from question validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The part path (if applicable).
    pub part_path: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a question for common authoring issues.
pub fn validate_question(def: &QuestionDef) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for var in &def.variables {
        if !seen.insert(normalize_name(&var.name)) {
            warnings.push(ValidationWarning {
                part_path: None,
                message: format!("duplicate variable name: {}", var.name),
            });
        }
    }

    if def.parts.is_empty() {
        warnings.push(ValidationWarning {
            part_path: None,
            message: "question has no parts".into(),
        });
    }

    for (i, part) in def.parts.iter().enumerate() {
        validate_part(part, &part_path(i), &mut warnings);
    }

    warnings
}

fn validate_part(part: &PartDef, path: &str, warnings: &mut Vec<ValidationWarning>) {
    let mut warn = |message: String| {
        warnings.push(ValidationWarning {
            part_path: Some(path.to_string()),
            message,
        })
    };

    match part {
        PartDef::Jme(settings) => {
            if settings.marks > 0.0 && settings.answer.trim().is_empty() {
                warn("part is worth marks but has no correct answer".into());
            }
            if settings.marks < 0.0 {
                warn(format!("negative marks: {}", settings.marks));
            }
            if let Err(e) = settings.checking.validate() {
                warn(e.to_string());
            }

            let policy = &settings.validation;
            if let (Some(must), Some(not)) = (&policy.must_have, &policy.not_allowed) {
                for s in must.strings.iter().filter(|s| not.strings.contains(s)) {
                    warn(format!("`{s}` is both required and not allowed"));
                }
            }
            if !policy.expected_variable_names.is_empty() && !policy.check_variable_names {
                warn("expected_variable_names is set but check_variable_names is false".into());
            }
            if let (Some(min), Some(max)) = (&policy.min_length, &policy.max_length) {
                if min.length > 0 && max.length > 0 && min.length > max.length {
                    warn(format!(
                        "min_length {} is greater than max_length {}",
                        min.length, max.length
                    ));
                }
            }
        }
        PartDef::GapFill { gaps } => {
            if gaps.is_empty() {
                warn("gap-fill part has no gaps".into());
            } else if part.marks() == 0.0 {
                warn("gap-fill part is worth no marks".into());
            }
            for (i, gap) in gaps.iter().enumerate() {
                validate_part(gap, &gap_path(path, i), warnings);
            }
        }
    }
}
