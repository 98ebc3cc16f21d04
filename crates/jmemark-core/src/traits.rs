//! Collaborator traits consumed by the marking engine.
//!
//! `jmemark-jme` implements [`Evaluator`] and [`Canonicalizer`]; the core only
//! ever talks to expressions through these.

use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::error::{EvalError, ParseError, SimplifyError};
use crate::model::Value;
use crate::scope::VariableScope;

/// Read-only lookup of variable values during evaluation.
///
/// Names are case-normalized (lower case) before lookup.
pub trait Bindings {
    fn get(&self, name: &str) -> Option<&Value>;
}

/// Parses expression text and evaluates the resulting trees.
pub trait Evaluator: Send + Sync {
    /// The parsed, immutable expression tree.
    type Expr: Clone + PartialEq + Debug + Send + Sync;

    /// Parse text into an expression tree.
    fn parse(&self, text: &str) -> Result<Self::Expr, ParseError>;

    /// Evaluate a tree. Must be deterministic for identical trees and bindings.
    fn evaluate(&self, expr: &Self::Expr, bindings: &dyn Bindings) -> Result<Value, EvalError>;

    /// Lower-cased names of the free variables in a tree.
    fn free_variables(&self, expr: &Self::Expr) -> BTreeSet<String>;

    /// Render a tree back to text, without redundant whitespace or brackets.
    fn render(&self, expr: &Self::Expr) -> String;
}

/// Rewrites expression text into a canonical display form.
pub trait Canonicalizer: Send + Sync {
    /// Apply the named rules. Must not alter numeric meaning.
    fn simplify(
        &self,
        text: &str,
        rules: &[String],
        scope: &VariableScope,
    ) -> Result<String, SimplifyError>;

    /// The rule names applied when a part doesn't ask for specific ones.
    fn default_rules(&self) -> Vec<String>;

    /// Every rule name this canonicalizer knows.
    fn known_rules(&self) -> Vec<String>;
}

/// An engine that can both evaluate and canonicalize.
pub trait ExpressionEngine: Evaluator + Canonicalizer {}

impl<T: Evaluator + Canonicalizer> ExpressionEngine for T {}
