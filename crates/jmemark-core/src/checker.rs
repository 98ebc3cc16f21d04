//! Numeric equivalence checking by repeated randomized evaluation.
//!
//! Both expressions are evaluated on `points` sampled binding sets and the
//! results compared with the configured predicate. A trial fails when the
//! predicate is false or either side can't be evaluated; the answers are
//! equivalent while the failures stay within the part's budget.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, EvalError};
use crate::model::{CheckingConfig, CheckingType, Value};
use crate::sampler::VariableSampler;
use crate::scope::{VariableBindingSet, VariableScope};
use crate::traits::Evaluator;

/// Smallest magnitude used as the denominator of a relative difference.
///
/// Keeps results that should be zero but carry rounding noise (`1e-16`)
/// comparable with an exact zero.
pub const RELATIVE_FLOOR: f64 = 1e-10;

/// Result of comparing two expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub equivalent: bool,
    /// Trials that failed.
    pub failures: u32,
    /// Trials run.
    pub trials: u32,
}

/// Compares expressions over sampled variable values.
pub struct AnswerChecker<'e, E: Evaluator> {
    evaluator: &'e E,
    seed: u64,
}

impl<'e, E: Evaluator> AnswerChecker<'e, E> {
    /// Every check made by this checker draws from the same seed.
    pub fn new(evaluator: &'e E, seed: u64) -> Self {
        Self { evaluator, seed }
    }

    /// Decide whether `candidate` and `reference` agree on the sampled trials.
    pub fn check_equivalent(
        &self,
        candidate: &E::Expr,
        reference: &E::Expr,
        config: &CheckingConfig,
        scope: &VariableScope,
    ) -> CheckOutcome {
        let mut names: BTreeSet<String> = self.evaluator.free_variables(candidate);
        names.extend(self.evaluator.free_variables(reference));

        let trials = VariableSampler::new(self.seed).sample(&names, config, scope);
        let mut failures = 0u32;

        for (i, bindings) in trials.iter().enumerate() {
            let a = self.evaluate(candidate, bindings);
            let b = self.evaluate(reference, bindings);
            let agreed = match (&a, &b) {
                (Ok(a), Ok(b)) => values_agree(a, b, config.checking_type, config.accuracy),
                _ => false,
            };
            if !agreed {
                failures += 1;
                tracing::trace!(
                    trial = i,
                    candidate = ?a,
                    reference = ?b,
                    sampled = ?bindings.sampled(),
                    "trial failed"
                );
            }
        }

        let outcome = CheckOutcome {
            equivalent: failures <= config.max_failures,
            failures,
            trials: config.points,
        };
        tracing::debug!(
            equivalent = outcome.equivalent,
            failures = outcome.failures,
            trials = outcome.trials,
            checking_type = %config.checking_type,
            "checked equivalence"
        );
        outcome
    }

    /// Make sure the reference evaluates on at least one sampled trial.
    pub fn probe_reference(
        &self,
        reference: &E::Expr,
        answer: &str,
        config: &CheckingConfig,
        scope: &VariableScope,
    ) -> Result<(), ConfigurationError> {
        let names = self.evaluator.free_variables(reference);
        let trials = VariableSampler::new(self.seed).sample(&names, config, scope);

        let mut last_error = None;
        for bindings in &trials {
            match self.evaluate(reference, bindings) {
                Ok(_) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        Err(ConfigurationError::ReferenceNeverEvaluates {
            answer: answer.to_string(),
            trials: config.points,
            last_error: last_error.unwrap_or(EvalError::NonFinite),
        })
    }

    fn evaluate(&self, expr: &E::Expr, bindings: &VariableBindingSet<'_>) -> Result<Value, EvalError> {
        let value = self.evaluator.evaluate(expr, bindings)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

/// Compare two evaluated results with a checking predicate.
///
/// Vectors and matrices are compared element-wise; shapes must match.
pub fn values_agree(a: &Value, b: &Value, checking_type: CheckingType, accuracy: f64) -> bool {
    let agree = |x: &f64, y: &f64| numbers_agree(*x, *y, checking_type, accuracy);
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => agree(x, y),
        (Value::Vector(xs), Value::Vector(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| agree(x, y))
        }
        (Value::Matrix(xs), Value::Matrix(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys).all(|(rx, ry)| {
                    rx.len() == ry.len() && rx.iter().zip(ry).all(|(x, y)| agree(x, y))
                })
        }
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        _ => false,
    }
}

/// Compare two numbers with a checking predicate.
pub fn numbers_agree(a: f64, b: f64, checking_type: CheckingType, accuracy: f64) -> bool {
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    match checking_type {
        CheckingType::RelDiff => {
            let scale = a.abs().max(b.abs()).max(RELATIVE_FLOOR);
            (a - b).abs() / scale <= accuracy
        }
        CheckingType::AbsDiff => (a - b).abs() <= accuracy,
        CheckingType::DecimalPlaces => {
            let factor = 10f64.powi(accuracy.round() as i32);
            (a * factor).round() == (b * factor).round()
        }
        CheckingType::SigFig => {
            let figures = (accuracy.round() as i32).max(1);
            let (ra, rb) = (round_sig_figs(a, figures), round_sig_figs(b, figures));
            ra == rb || (ra - rb).abs() <= 1e-12 * ra.abs().max(rb.abs())
        }
        CheckingType::Exact => a == b,
    }
}

fn round_sig_figs(x: f64, figures: i32) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    let magnitude = x.abs().log10().floor() as i32;
    let factor = 10f64.powi(figures - 1 - magnitude);
    (x * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEvaluator;
    use crate::model::SampleDistribution;

    fn evaluator() -> MockEvaluator {
        MockEvaluator::new()
            .with("2*x", &["x"], |b| Ok(2.0 * b.num("x")?))
            .with("x+x", &["x"], |b| Ok(b.num("x")? + b.num("x")?))
            .with("x^2", &["x"], |b| Ok(b.num("x")?.powi(2)))
            .with("x^2+1e-9", &["x"], |b| Ok(b.num("x")?.powi(2) + 1e-9))
            .with("1/x", &["x"], |b| {
                let x = b.num("x")?;
                if x == 0.0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(1.0 / x)
                }
            })
            .with("sqrt(x)", &["x"], |b| {
                let x = b.num("x")?;
                if x < 0.0 {
                    Err(EvalError::Domain {
                        function: "sqrt".into(),
                        input: x.to_string(),
                    })
                } else {
                    Ok(x.sqrt())
                }
            })
            .with("a*x", &["a", "x"], |b| Ok(b.num("a")? * b.num("x")?))
            .with("3*x", &["x"], |b| Ok(3.0 * b.num("x")?))
            .with("y", &["y"], |b| b.num("y"))
    }

    fn config(checking_type: CheckingType, accuracy: f64) -> CheckingConfig {
        CheckingConfig {
            checking_type,
            accuracy,
            max_failures: 0,
            range_start: -5.0,
            range_end: 5.0,
            points: 10,
            distribution: SampleDistribution::Uniform,
        }
    }

    const ALL_TYPES: [(CheckingType, f64); 5] = [
        (CheckingType::RelDiff, 0.0001),
        (CheckingType::AbsDiff, 0.0001),
        (CheckingType::DecimalPlaces, 4.0),
        (CheckingType::SigFig, 5.0),
        (CheckingType::Exact, 0.0),
    ];

    fn check(e: &MockEvaluator, a: &str, b: &str, cfg: &CheckingConfig, seed: u64) -> CheckOutcome {
        let scope = VariableScope::new();
        let checker = AnswerChecker::new(e, seed);
        checker.check_equivalent(&e.expr(a), &e.expr(b), cfg, &scope)
    }

    #[test]
    fn equal_forms_are_equivalent() {
        let e = evaluator();
        let outcome = check(&e, "2*x", "x+x", &config(CheckingType::RelDiff, 0.0001), 1);
        assert!(outcome.equivalent);
        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.trials, 10);
    }

    #[test]
    fn different_forms_are_not_equivalent() {
        let e = evaluator();
        let outcome = check(&e, "2*x", "3*x", &config(CheckingType::RelDiff, 0.0001), 1);
        assert!(!outcome.equivalent);
        assert_eq!(outcome.failures, 10);
    }

    #[test]
    fn equivalence_is_symmetric_for_every_predicate() {
        let e = evaluator();
        let pairs = [("2*x", "x+x"), ("2*x", "3*x"), ("x^2", "x^2+1e-9"), ("1/x", "sqrt(x)")];
        for (checking_type, accuracy) in ALL_TYPES {
            let cfg = config(checking_type, accuracy);
            for (a, b) in pairs {
                for seed in [0, 17, 99] {
                    assert_eq!(
                        check(&e, a, b, &cfg, seed),
                        check(&e, b, a, &cfg, seed),
                        "{checking_type} {a} vs {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn identical_expressions_always_equivalent() {
        let e = evaluator();
        for (checking_type, accuracy) in ALL_TYPES {
            let cfg = config(checking_type, accuracy);
            for seed in 0..25 {
                for expr in ["2*x", "x^2", "a*x"] {
                    assert!(check(&e, expr, expr, &cfg, seed).equivalent, "{expr} {seed}");
                }
            }
        }
    }

    #[test]
    fn failure_budget_is_monotonic() {
        let e = evaluator();
        // sqrt fails on roughly half the range
        let mut previous = false;
        for max_failures in 0..=10 {
            let cfg = CheckingConfig {
                max_failures,
                ..config(CheckingType::RelDiff, 0.0001)
            };
            let outcome = check(&e, "sqrt(x)", "sqrt(x)", &cfg, 5);
            assert!(!previous || outcome.equivalent, "budget {max_failures} rejected");
            previous = outcome.equivalent;
        }
        assert!(previous, "a budget equal to the trial count accepts everything");
    }

    #[test]
    fn evaluation_errors_count_as_failures_not_aborts() {
        let e = evaluator();
        let cfg = CheckingConfig {
            range_start: -1.0,
            range_end: 1.0,
            points: 20,
            ..config(CheckingType::RelDiff, 0.0001)
        };
        let outcome = check(&e, "sqrt(x)", "sqrt(x)", &cfg, 11);
        assert!(outcome.failures > 0);
        assert!(outcome.failures < 20);
        assert!(!outcome.equivalent);

        let lenient = CheckingConfig {
            max_failures: outcome.failures,
            ..cfg
        };
        assert!(check(&e, "sqrt(x)", "sqrt(x)", &lenient, 11).equivalent);
    }

    #[test]
    fn free_variables_of_both_sides_are_sampled() {
        let e = evaluator();
        // `y` only appears in the candidate, so it must still be bound
        let outcome = check(&e, "y", "2*x", &config(CheckingType::RelDiff, 0.0001), 3);
        assert_eq!(outcome.failures, 10);
        assert!(!outcome.equivalent);
    }

    #[test]
    fn scope_variables_are_not_resampled() {
        let e = evaluator();
        let scope = VariableScope::from_pairs([("a", Value::Number(2.0))]);
        let checker = AnswerChecker::new(&e, 8);
        let outcome = checker.check_equivalent(
            &e.expr("a*x"),
            &e.expr("2*x"),
            &config(CheckingType::RelDiff, 0.0001),
            &scope,
        );
        assert!(outcome.equivalent);
    }

    #[test]
    fn probe_reports_reference_that_never_evaluates() {
        let e = evaluator();
        let cfg = CheckingConfig {
            range_start: -3.0,
            range_end: -1.0,
            ..config(CheckingType::RelDiff, 0.0001)
        };
        let scope = VariableScope::new();
        let checker = AnswerChecker::new(&e, 0);
        let err = checker
            .probe_reference(&e.expr("sqrt(x)"), "sqrt(x)", &cfg, &scope)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ReferenceNeverEvaluates { trials: 10, .. }));
        assert!(checker
            .probe_reference(&e.expr("x^2"), "x^2", &cfg, &scope)
            .is_ok());
    }

    #[test]
    fn predicates_behave_as_documented() {
        assert!(numbers_agree(100.0, 100.005, CheckingType::RelDiff, 0.0001));
        assert!(!numbers_agree(100.0, 100.5, CheckingType::RelDiff, 0.0001));
        assert!(numbers_agree(0.0, 1e-16, CheckingType::RelDiff, 0.0001));
        assert!(numbers_agree(1.0, 1.05, CheckingType::AbsDiff, 0.1));
        assert!(!numbers_agree(1.0, 1.2, CheckingType::AbsDiff, 0.1));
        assert!(numbers_agree(3.14159, 3.14161, CheckingType::DecimalPlaces, 3.0));
        assert!(!numbers_agree(3.141, 3.149, CheckingType::DecimalPlaces, 3.0));
        assert!(numbers_agree(123456.0, 123_400.0, CheckingType::SigFig, 3.0));
        assert!(!numbers_agree(123456.0, 124_400.0, CheckingType::SigFig, 3.0));
        assert!(numbers_agree(4.0, 4.0, CheckingType::Exact, 0.0));
        assert!(!numbers_agree(4.0, 4.0 + 1e-12, CheckingType::Exact, 0.0));
        assert!(!numbers_agree(f64::NAN, f64::NAN, CheckingType::Exact, 0.0));
    }

    #[test]
    fn structured_values_compare_elementwise() {
        let v1 = Value::Vector(vec![1.0, 2.0]);
        let v2 = Value::Vector(vec![1.0, 2.00001]);
        let v3 = Value::Vector(vec![1.0, 2.0, 3.0]);
        assert!(values_agree(&v1, &v2, CheckingType::AbsDiff, 0.001));
        assert!(!values_agree(&v1, &v3, CheckingType::AbsDiff, 0.001));
        assert!(!values_agree(&v1, &Value::Number(1.0), CheckingType::AbsDiff, 0.001));

        let m1 = Value::Matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let m2 = Value::Matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(values_agree(&m1, &m2, CheckingType::Exact, 0.0));
        assert!(values_agree(
            &Value::Boolean(true),
            &Value::Boolean(true),
            CheckingType::RelDiff,
            0.0
        ));
    }
}
