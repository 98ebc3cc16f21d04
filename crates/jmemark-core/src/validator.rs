//! String-level answer policy, independent of numeric equivalence.
//!
//! A structural problem (the answer doesn't parse, or uses a variable outside
//! the expected set) stops marking with no credit. Every other check produces
//! a [`Penalty`] that scales the credit from the numeric check.

use crate::error::StructuralAnswerError;
use crate::model::{LengthLimit, StringRequirement, ValidationPolicy};
use crate::traits::Evaluator;

pub const TOO_SHORT_MESSAGE: &str = "Your answer is too short.";
pub const TOO_LONG_MESSAGE: &str = "Your answer is too long.";
pub const MISSING_STRINGS_MESSAGE: &str = "Your answer does not contain everything it should.";
pub const FORBIDDEN_STRINGS_MESSAGE: &str = "Your answer contains something it should not.";

/// A credit multiplier triggered by a failed policy check.
#[derive(Debug, Clone, PartialEq)]
pub struct Penalty {
    /// In `[0, 1]`.
    pub factor: f64,
    pub message: String,
}

/// A structurally valid answer and the penalties it incurred.
#[derive(Debug, Clone)]
pub struct Validation<X> {
    /// The parsed answer.
    pub expr: X,
    /// The answer re-rendered from its tree.
    pub cleaned: String,
    pub penalties: Vec<Penalty>,
}

impl<X> Validation<X> {
    /// Product of every penalty factor.
    pub fn multiplier(&self) -> f64 {
        self.penalties.iter().map(|p| p.factor).product()
    }
}

/// Parse `raw` and apply `policy` to it.
pub fn validate<E: Evaluator>(
    evaluator: &E,
    raw: &str,
    policy: &ValidationPolicy,
) -> Result<Validation<E::Expr>, StructuralAnswerError> {
    let expr = evaluator
        .parse(raw)
        .map_err(StructuralAnswerError::Unparseable)?;

    if policy.check_variable_names {
        let disallowed: Vec<String> = evaluator
            .free_variables(&expr)
            .into_iter()
            .filter(|name| {
                !policy
                    .expected_variable_names
                    .iter()
                    .any(|expected| expected.trim().eq_ignore_ascii_case(name))
            })
            .collect();
        if !disallowed.is_empty() {
            return Err(StructuralAnswerError::DisallowedVariables(disallowed));
        }
    }

    let cleaned = evaluator.render(&expr);
    let length = cleaned.chars().filter(|c| !c.is_whitespace()).count();
    let mut penalties = Vec::new();

    if let Some(limit) = active(&policy.min_length) {
        if length < limit.length {
            penalties.push(length_penalty(limit, TOO_SHORT_MESSAGE));
        }
    }

    if let Some(limit) = active(&policy.max_length) {
        if length > limit.length {
            penalties.push(length_penalty(limit, TOO_LONG_MESSAGE));
        }
    }

    if let Some(req) = &policy.must_have {
        if req.strings.iter().any(|s| !raw.contains(s.as_str())) {
            penalties.push(string_penalty(
                req,
                MISSING_STRINGS_MESSAGE,
                "Your answer must contain all of:",
            ));
        }
    }

    if let Some(req) = &policy.not_allowed {
        if req.strings.iter().any(|s| raw.contains(s.as_str())) {
            penalties.push(string_penalty(
                req,
                FORBIDDEN_STRINGS_MESSAGE,
                "Your answer must not contain any of:",
            ));
        }
    }

    Ok(Validation {
        expr,
        cleaned,
        penalties,
    })
}

fn active(limit: &Option<LengthLimit>) -> Option<&LengthLimit> {
    limit.as_ref().filter(|l| l.length > 0)
}

fn length_penalty(limit: &LengthLimit, default_message: &str) -> Penalty {
    Penalty {
        factor: limit.partial_credit.clamp(0.0, 1.0),
        message: limit
            .message
            .clone()
            .unwrap_or_else(|| default_message.to_string()),
    }
}

fn string_penalty(req: &StringRequirement, default_message: &str, listing: &str) -> Penalty {
    let mut message = req
        .message
        .clone()
        .unwrap_or_else(|| default_message.to_string());
    if req.show_strings {
        let strings: Vec<String> = req.strings.iter().map(|s| format!("`{s}`")).collect();
        message = format!("{message} {listing} {}.", strings.join(", "));
    }
    Penalty {
        factor: req.partial_credit.clamp(0.0, 1.0),
        message,
    }
}
