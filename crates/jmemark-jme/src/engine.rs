//! The [`JmeEngine`]: parsing, evaluation, and simplification behind the
//! core traits.

use std::collections::BTreeSet;

use jmemark_core::error::{EvalError, ParseError, SimplifyError};
use jmemark_core::model::Value;
use jmemark_core::scope::VariableScope;
use jmemark_core::traits::{Bindings, Canonicalizer, Evaluator};

use crate::ast::Expr;
use crate::simplify::{simplify, Rule};

/// Expression engine for JME text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JmeEngine;

impl JmeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for JmeEngine {
    type Expr = Expr;

    fn parse(&self, text: &str) -> Result<Expr, ParseError> {
        crate::parser::parse(text)
    }

    fn evaluate(&self, expr: &Expr, bindings: &dyn Bindings) -> Result<Value, EvalError> {
        crate::eval::evaluate(expr, bindings)
    }

    fn free_variables(&self, expr: &Expr) -> BTreeSet<String> {
        expr.free_variables()
    }

    fn render(&self, expr: &Expr) -> String {
        expr.to_string()
    }
}

impl Canonicalizer for JmeEngine {
    fn simplify(
        &self,
        text: &str,
        rules: &[String],
        _scope: &VariableScope,
    ) -> Result<String, SimplifyError> {
        let rules = rules
            .iter()
            .map(|name| Rule::from_name(name).ok_or_else(|| SimplifyError::UnknownRule(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let expr = crate::parser::parse(text)?;
        Ok(simplify(expr, &rules).to_string())
    }

    fn default_rules(&self) -> Vec<String> {
        self.known_rules()
    }

    fn known_rules(&self) -> Vec<String> {
        Rule::ALL.iter().map(|r| r.name().to_string()).collect()
    }
}
