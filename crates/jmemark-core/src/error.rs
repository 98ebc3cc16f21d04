//! Error types for marking.
//!
//! Configuration errors are fatal and author-facing; structural answer errors
//! are soft and end up as feedback; evaluation errors are counted against a
//! part's failure budget and never surface on their own. The evaluator and
//! simplifier errors live here so that `jmemark-jme` and the checker agree on
//! one taxonomy without string matching.

use thiserror::Error;

/// A failure to parse expression text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// Byte offset into the source text.
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A failure to evaluate an expression against one set of bindings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A variable had no binding in the overlay or the scope.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// A function name the evaluator doesn't know.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The operation has no real result for this input (e.g. `sqrt(-1)`).
    #[error("{function} is undefined for {input}")]
    Domain { function: String, input: String },

    /// Operands of incompatible kinds or shapes.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A function called with the wrong number of arguments.
    #[error("{function} takes {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },

    /// The result overflowed or was otherwise not a finite number.
    #[error("result is not a finite number")]
    NonFinite,
}

/// A failure to canonicalize an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimplifyError {
    /// A rule set named a rule that doesn't exist.
    #[error("unknown simplification rule: {0}")]
    UnknownRule(String),

    /// The text to simplify couldn't be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Fatal errors raised while constructing a part or question.
///
/// No partially built part is usable once one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The model answer is missing or empty but the part is worth marks.
    #[error("the correct answer is missing")]
    AnswerMissing,

    /// The model answer doesn't parse after substitution and simplification.
    #[error("the correct answer `{answer}` can't be parsed: {source}")]
    ReferenceUnparseable { answer: String, source: ParseError },

    /// The model answer failed to evaluate on every sampled trial.
    #[error("the correct answer `{answer}` failed to evaluate on all {trials} trial(s): {last_error}")]
    ReferenceNeverEvaluates {
        answer: String,
        trials: u32,
        last_error: EvalError,
    },

    /// The checking settings are inconsistent.
    #[error("invalid checking settings: {0}")]
    InvalidChecking(String),

    /// The answer simplification rule set is invalid.
    #[error(transparent)]
    Simplification(#[from] SimplifyError),

    /// A question variable's definition couldn't be evaluated.
    #[error("variable `{name}` can't be evaluated: {reason}")]
    Variable { name: String, reason: String },

    /// Wraps another configuration error with the path of the part it came from.
    #[error("part {path}: {source}")]
    InPart {
        path: String,
        #[source]
        source: Box<ConfigurationError>,
    },
}

impl ConfigurationError {
    /// Attach the path of the part being built.
    pub fn in_part(self, path: impl Into<String>) -> Self {
        ConfigurationError::InPart {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

/// Soft, student-facing errors that stop the numeric check for one answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralAnswerError {
    /// The answer isn't a valid expression.
    #[error("This is not a valid mathematical expression: {0}")]
    Unparseable(ParseError),

    /// The answer uses variables outside the expected set.
    #[error("You used the variable(s) {} which are not expected in this answer.", .0.join(", "))]
    DisallowedVariables(Vec<String>),
}

/// A part that could not be marked at all.
#[derive(Debug, Error)]
pub enum MarkingError {
    /// The part has no reference answer to compare against.
    #[error("part {0} has no correct answer to mark against")]
    NoReference(String),

    /// Any other failure raised by a custom part.
    #[error("part {path} could not be marked: {reason}")]
    Failed { path: String, reason: String },
}
