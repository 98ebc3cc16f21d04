//! Mock expression engine for testing marking without a real evaluator.
//!
//! Expressions are registered up front by their text together with a closure
//! that computes their value. Parsing only recognizes registered text
//! (whitespace is ignored), so tests control exactly what "equivalent" means.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{EvalError, ParseError, SimplifyError};
use crate::model::Value;
use crate::scope::VariableScope;
use crate::traits::{Bindings, Canonicalizer, Evaluator};

/// A registered expression, identified by its whitespace-free text.
#[derive(Debug, Clone, PartialEq)]
pub struct MockExpr(pub String);

/// Variable access handed to registered closures.
pub struct MockBindings<'a>(&'a dyn Bindings);

impl MockBindings<'_> {
    /// Look up a number by name.
    pub fn num(&self, name: &str) -> Result<f64, EvalError> {
        match self.0.get(name) {
            Some(Value::Number(n)) => Ok(*n),
            Some(other) => Err(EvalError::TypeMismatch(format!(
                "{name} is a {}",
                other.kind()
            ))),
            None => Err(EvalError::UnknownVariable(name.to_string())),
        }
    }
}

type MockFn = Arc<dyn Fn(&MockBindings<'_>) -> Result<f64, EvalError> + Send + Sync>;

struct Registered {
    variables: BTreeSet<String>,
    eval: MockFn,
}

/// A mock [`Evaluator`] and [`Canonicalizer`] driven by registered closures.
#[derive(Default)]
pub struct MockEvaluator {
    exprs: HashMap<String, Registered>,
}

fn key(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an expression with its free variables and value.
    pub fn with<F>(mut self, text: &str, variables: &[&str], eval: F) -> Self
    where
        F: Fn(&MockBindings<'_>) -> Result<f64, EvalError> + Send + Sync + 'static,
    {
        self.exprs.insert(
            key(text),
            Registered {
                variables: variables.iter().map(|v| v.to_lowercase()).collect(),
                eval: Arc::new(eval),
            },
        );
        self
    }

    /// Register a constant.
    pub fn with_constant(self, text: &str, value: f64) -> Self {
        self.with(text, &[], move |_| Ok(value))
    }

    /// Parse registered text, panicking if it isn't registered.
    pub fn expr(&self, text: &str) -> MockExpr {
        self.parse(text)
            .unwrap_or_else(|e| panic!("`{text}` is not registered: {e}"))
    }
}

impl Evaluator for MockEvaluator {
    type Expr = MockExpr;

    fn parse(&self, text: &str) -> Result<MockExpr, ParseError> {
        let k = key(text);
        if self.exprs.contains_key(&k) {
            Ok(MockExpr(k))
        } else {
            Err(ParseError::new(format!("unrecognized expression `{text}`"), 0))
        }
    }

    fn evaluate(&self, expr: &MockExpr, bindings: &dyn Bindings) -> Result<Value, EvalError> {
        let registered = self
            .exprs
            .get(&expr.0)
            .ok_or_else(|| EvalError::UnknownFunction(expr.0.clone()))?;
        (registered.eval)(&MockBindings(bindings)).map(Value::Number)
    }

    fn free_variables(&self, expr: &MockExpr) -> BTreeSet<String> {
        self.exprs
            .get(&expr.0)
            .map(|r| r.variables.clone())
            .unwrap_or_default()
    }

    fn render(&self, expr: &MockExpr) -> String {
        expr.0.clone()
    }
}

impl Canonicalizer for MockEvaluator {
    fn simplify(
        &self,
        text: &str,
        rules: &[String],
        _scope: &VariableScope,
    ) -> Result<String, SimplifyError> {
        let known = self.known_rules();
        if let Some(unknown) = rules.iter().find(|r| !known.contains(r)) {
            return Err(SimplifyError::UnknownRule(unknown.clone()));
        }
        Ok(text.trim().to_string())
    }

    fn default_rules(&self) -> Vec<String> {
        vec!["basic".to_string()]
    }

    fn known_rules(&self) -> Vec<String> {
        vec!["basic".to_string(), "unitFactor".to_string()]
    }
}
