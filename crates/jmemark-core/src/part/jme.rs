//! Single mathematical-expression part.
//!
//! The student enters an expression, e.g. `x^2+x+1`, which is compared with
//! the correct answer by evaluating both over a range of values.

use std::sync::Arc;

use crate::checker::AnswerChecker;
use crate::error::{ConfigurationError, MarkingError, SimplifyError};
use crate::model::{ExpressionPartSettings, Feedback, PartResult, SymbolicAnswer};
use crate::scope::VariableScope;
use crate::store::AnswerStore;
use crate::traits::{Canonicalizer, ExpressionEngine};
use crate::validator::validate;

use super::Markable;

pub const CORRECT_MESSAGE: &str = "Your answer is numerically correct.";
pub const INCORRECT_MESSAGE: &str = "Your answer is incorrect.";
pub const NO_ANSWER_MESSAGE: &str = "You did not enter an answer.";

/// The model answer, computed once per question instance.
#[derive(Debug, Clone)]
struct Reference<X> {
    /// Canonical text, used for display and reveal.
    text: String,
    expr: X,
}

/// A part whose answer is a single mathematical expression.
pub struct ExpressionPart<E: ExpressionEngine> {
    id: String,
    settings: ExpressionPartSettings,
    engine: Arc<E>,
    scope: Arc<VariableScope>,
    reference: Option<Reference<E::Expr>>,
    seed: u64,
    staged_answer: String,
    student_answer: String,
    answered: bool,
    revealed: bool,
}

impl<E: ExpressionEngine> ExpressionPart<E> {
    /// Build the part, computing its reference answer from the scope.
    ///
    /// Fails when the answer is missing on a part worth marks, doesn't parse,
    /// or can't be evaluated on any sampled trial.
    pub fn new(
        id: impl Into<String>,
        settings: ExpressionPartSettings,
        scope: Arc<VariableScope>,
        engine: Arc<E>,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        let id = id.into();
        let reference = build_reference(&settings, &scope, engine.as_ref(), seed)
            .map_err(|e| e.in_part(id.as_str()))?;

        if let Some(r) = &reference {
            tracing::debug!(part = %id, answer = %r.text, "built reference answer");
        }

        Ok(Self {
            id,
            settings,
            engine,
            scope,
            reference,
            seed,
            staged_answer: String::new(),
            student_answer: String::new(),
            answered: false,
            revealed: false,
        })
    }

    /// Canonical text of the correct answer, if there is one.
    pub fn correct_answer(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.text.as_str())
    }

    pub fn settings(&self) -> &ExpressionPartSettings {
        &self.settings
    }

    pub fn staged_answer(&self) -> &str {
        &self.staged_answer
    }

    /// The last submitted answer.
    pub fn student_answer(&self) -> &str {
        &self.student_answer
    }

    /// Mark a raw answer against the reference.
    pub fn mark_answer(&mut self, raw: &str) -> Result<PartResult, MarkingError> {
        let mut result = PartResult::new(self.settings.marks);

        if raw.trim().is_empty() {
            self.answered = false;
            result.feedback.push(Feedback::warning(NO_ANSWER_MESSAGE));
            return Ok(result);
        }

        let Some(reference) = &self.reference else {
            self.answered = false;
            return Err(MarkingError::NoReference(self.id.clone()));
        };

        self.answered = true;
        result.answered = true;

        let validation = match validate(self.engine.as_ref(), raw, &self.settings.validation) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(part = %self.id, error = %e, "answer rejected before checking");
                result.feedback.push(Feedback::invalid(e.to_string()));
                return Ok(result);
            }
        };

        let outcome = AnswerChecker::new(self.engine.as_ref(), self.seed).check_equivalent(
            &validation.expr,
            &reference.expr,
            &self.settings.checking,
            &self.scope,
        );

        if outcome.equivalent {
            result.set_credit(1.0, CORRECT_MESSAGE);
        } else {
            result.set_credit(0.0, INCORRECT_MESSAGE);
        }

        for penalty in validation.penalties {
            result.multiply_credit(penalty.factor, penalty.message);
        }
        result.credit = result.credit.clamp(0.0, 1.0);

        tracing::debug!(
            part = %self.id,
            credit = result.credit,
            failures = outcome.failures,
            "marked expression part"
        );
        Ok(result)
    }
}

fn build_reference<E: ExpressionEngine>(
    settings: &ExpressionPartSettings,
    scope: &VariableScope,
    engine: &E,
    seed: u64,
) -> Result<Option<Reference<E::Expr>>, ConfigurationError> {
    settings.checking.validate()?;
    let rules = collect_ruleset(&settings.simplification, engine)?;

    let substituted = scope.substitute(&settings.answer);
    if substituted.trim().is_empty() {
        return if settings.marks > 0.0 {
            Err(ConfigurationError::AnswerMissing)
        } else {
            Ok(None)
        };
    }

    let unparseable = |answer: &str, source| ConfigurationError::ReferenceUnparseable {
        answer: answer.to_string(),
        source,
    };

    engine
        .parse(&substituted)
        .map_err(|source| unparseable(&substituted, source))?;
    let text = engine.simplify(&substituted, &rules, scope)?;
    if text.trim().is_empty() {
        return Err(ConfigurationError::AnswerMissing);
    }
    let expr = engine
        .parse(&text)
        .map_err(|source| unparseable(&text, source))?;

    AnswerChecker::new(engine, seed).probe_reference(&expr, &text, &settings.checking, scope)?;

    Ok(Some(Reference { text, expr }))
}

/// Resolve a simplification rule set description into rule names.
///
/// The description is a comma-separated list of rule names; `all` adds every
/// known rule and `!name` removes one. An empty description, or one that
/// starts with a removal, starts from the canonicalizer's default rules.
pub fn collect_ruleset<C: Canonicalizer + ?Sized>(
    description: &str,
    canonicalizer: &C,
) -> Result<Vec<String>, SimplifyError> {
    let known = canonicalizer.known_rules();
    let resolve = |name: &str| {
        known
            .iter()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SimplifyError::UnknownRule(name.to_string()))
    };

    let tokens: Vec<&str> = description
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let mut rules = match tokens.first() {
        None => return Ok(canonicalizer.default_rules()),
        Some(first) if first.starts_with('!') => canonicalizer.default_rules(),
        Some(_) => Vec::new(),
    };

    for token in tokens {
        if let Some(name) = token.strip_prefix('!') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("all") {
                rules.clear();
            } else {
                let name = resolve(name)?;
                rules.retain(|r| r != &name);
            }
        } else if token.eq_ignore_ascii_case("all") {
            for rule in &known {
                if !rules.contains(rule) {
                    rules.push(rule.clone());
                }
            }
        } else {
            let name = resolve(token)?;
            if !rules.contains(&name) {
                rules.push(name);
            }
        }
    }

    Ok(rules)
}

impl<E: ExpressionEngine + 'static> Markable for ExpressionPart<E> {
    fn id(&self) -> &str {
        &self.id
    }

    fn marks(&self) -> f64 {
        self.settings.marks
    }

    fn answered(&self) -> bool {
        self.answered
    }

    fn mark(&mut self) -> Result<PartResult, MarkingError> {
        self.set_student_answer();
        let answer = self.student_answer.clone();
        self.mark_answer(&answer)
    }

    fn reveal_answer(&mut self) {
        if let Some(reference) = &self.reference {
            self.staged_answer = reference.text.clone();
        }
        self.revealed = true;
    }

    fn is_revealed(&self) -> bool {
        self.revealed
    }

    fn stage_answer(&mut self, answer: SymbolicAnswer) {
        match answer {
            SymbolicAnswer::Text(text) => self.staged_answer = text,
            SymbolicAnswer::List(_) => {
                tracing::warn!(part = %self.id, "ignoring a list answer staged on a single-answer part");
            }
        }
    }

    fn set_student_answer(&mut self) {
        self.student_answer = self.staged_answer.clone();
    }

    fn student_answer_as_symbolic(&self) -> SymbolicAnswer {
        SymbolicAnswer::Text(self.student_answer.clone())
    }

    fn resume(&mut self, store: &dyn AnswerStore) {
        if let Some(stored) = store.load(&self.id) {
            tracing::debug!(part = %self.id, "resumed staged answer");
            self.staged_answer = stored.student_answer;
        }
    }
}
