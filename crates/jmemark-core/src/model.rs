//! Core data model types for jmemark.
//!
//! Values produced by evaluation, the immutable checking and validation
//! settings of a part, the feedback and results produced by marking, and the
//! definitions a loader fills in to build a question.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Number(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
    Boolean(bool),
}

impl Value {
    /// The number inside, if this is a scalar.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether every number inside is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Number(n) => n.is_finite(),
            Value::Vector(v) => v.iter().all(|n| n.is_finite()),
            Value::Matrix(rows) => rows.iter().flatten().all(|n| n.is_finite()),
            Value::Boolean(_) => true,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Vector(_) => "vector",
            Value::Matrix(_) => "matrix",
            Value::Boolean(_) => "boolean",
        }
    }
}

/// Format a number the way it would be written in an expression.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn join_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(|n| format_number(*n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Vector(v) => write!(f, "vector({})", join_numbers(v)),
            Value::Matrix(rows) => {
                let rows: Vec<String> = rows
                    .iter()
                    .map(|r| format!("[{}]", join_numbers(r)))
                    .collect();
                write!(f, "matrix({})", rows.join(", "))
            }
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

// ---------------------------------------------------------------------------
// Checking settings
// ---------------------------------------------------------------------------

/// How two evaluated results are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckingType {
    /// `|a-b| / max(|a|,|b|,ε) ≤ accuracy`
    RelDiff,
    /// `|a-b| ≤ accuracy`
    AbsDiff,
    /// Equal when rounded to `accuracy` decimal places.
    #[serde(rename = "dp")]
    DecimalPlaces,
    /// Equal when rounded to `accuracy` significant figures.
    SigFig,
    /// Exactly equal.
    Exact,
}

impl fmt::Display for CheckingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckingType::RelDiff => write!(f, "reldiff"),
            CheckingType::AbsDiff => write!(f, "absdiff"),
            CheckingType::DecimalPlaces => write!(f, "dp"),
            CheckingType::SigFig => write!(f, "sigfig"),
            CheckingType::Exact => write!(f, "exact"),
        }
    }
}

impl FromStr for CheckingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reldiff" => Ok(CheckingType::RelDiff),
            "absdiff" => Ok(CheckingType::AbsDiff),
            "dp" | "decimalplaces" => Ok(CheckingType::DecimalPlaces),
            "sigfig" => Ok(CheckingType::SigFig),
            "exact" => Ok(CheckingType::Exact),
            other => Err(format!("unknown checking type: {other}")),
        }
    }
}

/// How sampled variable values are drawn from the checking range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleDistribution {
    /// Real values, uniform over `[start, end]`.
    #[default]
    Uniform,
    /// Integers, uniform over the integers in `[start, end]`.
    Integer,
}

/// Most decimal places or significant figures a check may ask for; beyond
/// this an `f64` can't tell the digits apart.
pub const MAX_DIGITS: u32 = 15;

/// Settings for comparing a candidate against the reference answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckingConfig {
    /// Comparison predicate.
    pub checking_type: CheckingType,
    /// Threshold; its meaning depends on `checking_type`.
    pub accuracy: f64,
    /// Failed trials tolerated before the answers are judged different.
    pub max_failures: u32,
    /// Lower bound of the sampling range.
    pub range_start: f64,
    /// Upper bound of the sampling range.
    pub range_end: f64,
    /// Number of trials.
    pub points: u32,
    /// How values are drawn.
    #[serde(default)]
    pub distribution: SampleDistribution,
}

impl Default for CheckingConfig {
    fn default() -> Self {
        Self {
            checking_type: CheckingType::RelDiff,
            accuracy: 0.0001,
            max_failures: 0,
            range_start: 0.0,
            range_end: 1.0,
            points: 5,
            distribution: SampleDistribution::Uniform,
        }
    }
}

impl CheckingConfig {
    /// Reject settings that can't produce a meaningful check.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.points == 0 {
            return Err(ConfigurationError::InvalidChecking(
                "at least one checking point is required".into(),
            ));
        }
        if !self.range_start.is_finite() || !self.range_end.is_finite() {
            return Err(ConfigurationError::InvalidChecking(
                "the checking range must be finite".into(),
            ));
        }
        if self.range_start > self.range_end {
            return Err(ConfigurationError::InvalidChecking(format!(
                "range start {} is after range end {}",
                self.range_start, self.range_end
            )));
        }
        if self.distribution == SampleDistribution::Integer
            && self.range_start.ceil() > self.range_end.floor()
        {
            return Err(ConfigurationError::InvalidChecking(format!(
                "no integers in the range [{}, {}]",
                self.range_start, self.range_end
            )));
        }
        if self.accuracy.is_nan() || self.accuracy < 0.0 {
            return Err(ConfigurationError::InvalidChecking(format!(
                "accuracy must be non-negative, got {}",
                self.accuracy
            )));
        }
        if matches!(
            self.checking_type,
            CheckingType::DecimalPlaces | CheckingType::SigFig
        ) && self.accuracy.round() > f64::from(MAX_DIGITS)
        {
            return Err(ConfigurationError::InvalidChecking(format!(
                "{} checking supports at most {MAX_DIGITS} digits, got {}",
                self.checking_type, self.accuracy
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation policy
// ---------------------------------------------------------------------------

/// A length bound on the cleaned answer. A length of 0 disables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthLimit {
    pub length: usize,
    /// Credit multiplier applied when the bound is violated.
    #[serde(default)]
    pub partial_credit: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Strings that must (or must not) appear in the raw answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StringRequirement {
    pub strings: Vec<String>,
    /// Credit multiplier applied once if the requirement fails.
    #[serde(default)]
    pub partial_credit: f64,
    /// Reveal the strings to the student in the feedback message.
    #[serde(default)]
    pub show_strings: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// String-level constraints on an answer, independent of its value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationPolicy {
    #[serde(default)]
    pub min_length: Option<LengthLimit>,
    #[serde(default)]
    pub max_length: Option<LengthLimit>,
    #[serde(default)]
    pub must_have: Option<StringRequirement>,
    #[serde(default)]
    pub not_allowed: Option<StringRequirement>,
    /// Lower-cased names the answer may use.
    #[serde(default)]
    pub expected_variable_names: Vec<String>,
    /// Whether `expected_variable_names` is enforced.
    #[serde(default)]
    pub check_variable_names: bool,
}

// ---------------------------------------------------------------------------
// Feedback and results
// ---------------------------------------------------------------------------

/// What a feedback item did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// Credit was set outright.
    SetCredit,
    /// Credit was scaled by a penalty.
    MultiplyCredit,
    /// Information only.
    Comment,
    /// Something about the answer the student should fix.
    Warning,
    /// The answer could not be marked.
    Invalid,
    /// Separates the feedback of one gap from the next.
    Header,
}

/// One marking action, in the order it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
    /// Change in credit caused by this action.
    #[serde(default)]
    pub credit_change: f64,
    /// Index of the gap this came from, when forwarded by a gap-fill part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<usize>,
}

impl Feedback {
    pub fn new(kind: FeedbackKind, message: impl Into<String>, credit_change: f64) -> Self {
        Self {
            kind,
            message: message.into(),
            credit_change,
            gap: None,
        }
    }

    pub fn comment(message: impl Into<String>) -> Self {
        Self::new(FeedbackKind::Comment, message, 0.0)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FeedbackKind::Warning, message, 0.0)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(FeedbackKind::Invalid, message, 0.0)
    }

    pub fn header(message: impl Into<String>) -> Self {
        Self::new(FeedbackKind::Header, message, 0.0)
    }

    /// A copy of this item tagged with a gap index.
    pub fn tagged(&self, gap: usize) -> Self {
        Self {
            gap: Some(gap),
            ..self.clone()
        }
    }
}

/// The outcome of marking one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartResult {
    /// Fraction of the available marks awarded, in `[0, 1]`.
    pub credit: f64,
    /// Maximum marks available.
    pub marks: f64,
    /// Whether a non-empty answer was given.
    pub answered: bool,
    pub feedback: Vec<Feedback>,
}

impl PartResult {
    /// An unanswered, zero-credit result.
    pub fn new(marks: f64) -> Self {
        Self {
            credit: 0.0,
            marks,
            answered: false,
            feedback: Vec::new(),
        }
    }

    /// Marks awarded.
    pub fn score(&self) -> f64 {
        self.credit * self.marks
    }

    /// Set the credit outright, recording the change.
    pub fn set_credit(&mut self, credit: f64, message: impl Into<String>) {
        let credit = credit.clamp(0.0, 1.0);
        let change = credit - self.credit;
        self.credit = credit;
        self.feedback
            .push(Feedback::new(FeedbackKind::SetCredit, message, change));
    }

    /// Scale the credit by `factor`, recording the change.
    pub fn multiply_credit(&mut self, factor: f64, message: impl Into<String>) {
        let credit = (self.credit * factor).clamp(0.0, 1.0);
        let change = credit - self.credit;
        self.credit = credit;
        self.feedback
            .push(Feedback::new(FeedbackKind::MultiplyCredit, message, change));
    }
}

/// A student answer as a value a custom marking script could inspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymbolicAnswer {
    Text(String),
    List(Vec<SymbolicAnswer>),
}

impl From<&str> for SymbolicAnswer {
    fn from(text: &str) -> Self {
        SymbolicAnswer::Text(text.to_string())
    }
}

impl From<String> for SymbolicAnswer {
    fn from(text: String) -> Self {
        SymbolicAnswer::Text(text)
    }
}

// ---------------------------------------------------------------------------
// Question definitions
// ---------------------------------------------------------------------------

/// A question variable, defined by an expression over earlier variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub definition: String,
}

/// Settings for a single mathematical-expression part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionPartSettings {
    pub marks: f64,
    /// Model answer template; `{name}` is replaced by the variable's value.
    pub answer: String,
    /// Simplification rule set applied to the model answer.
    #[serde(default)]
    pub simplification: String,
    pub checking: CheckingConfig,
    #[serde(default)]
    pub validation: ValidationPolicy,
}

/// Definition of one part, before construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PartDef {
    Jme(ExpressionPartSettings),
    GapFill { gaps: Vec<PartDef> },
}

impl PartDef {
    /// Total marks, summing gaps for a gap-fill.
    pub fn marks(&self) -> f64 {
        match self {
            PartDef::Jme(settings) => settings.marks,
            PartDef::GapFill { gaps } => gaps.iter().map(PartDef::marks).sum(),
        }
    }
}

/// A complete question definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    #[serde(default)]
    pub parts: Vec<PartDef>,
    /// Fixed seed for variable sampling; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}
