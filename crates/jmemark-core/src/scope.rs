//! Question-level variable scope and per-trial binding overlays.

use std::collections::BTreeMap;

use crate::model::Value;
use crate::traits::Bindings;

/// Immutable snapshot of question variables, shared by every part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    variables: BTreeMap<String, Value>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope from `(name, value)` pairs. Names are lower-cased.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let variables = pairs
            .into_iter()
            .map(|(name, value)| (normalize_name(name.as_ref()), value))
            .collect();
        Self { variables }
    }

    /// A new scope with one more variable. The original is left untouched.
    pub fn with(&self, name: &str, value: Value) -> Self {
        let mut variables = self.variables.clone();
        variables.insert(normalize_name(name), value);
        Self { variables }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace `{name}` placeholders in a template with variable values.
    ///
    /// Negative numbers are bracketed so that `x^{a}` stays a power of the
    /// whole value. Unknown names and unbalanced braces are left as written.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = after[..close].trim();
            match self.variables.get(&normalize_name(name)) {
                Some(value) => {
                    let text = value.to_string();
                    if text.starts_with('-') {
                        out.push('(');
                        out.push_str(&text);
                        out.push(')');
                    } else {
                        out.push_str(&text);
                    }
                }
                None => {
                    tracing::debug!("no variable `{name}` to substitute, leaving placeholder");
                    out.push_str(&rest[open..open + close + 2]);
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

impl Bindings for VariableScope {
    fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Sampled values for one trial, layered over the shared scope.
#[derive(Debug, Clone)]
pub struct VariableBindingSet<'a> {
    scope: &'a VariableScope,
    sampled: BTreeMap<String, Value>,
}

impl<'a> VariableBindingSet<'a> {
    pub fn new(scope: &'a VariableScope, sampled: BTreeMap<String, Value>) -> Self {
        Self { scope, sampled }
    }

    /// Values drawn for this trial, excluding the scope.
    pub fn sampled(&self) -> &BTreeMap<String, Value> {
        &self.sampled
    }
}

impl Bindings for VariableBindingSet<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        self.sampled.get(name).or_else(|| self.scope.get(name))
    }
}

/// Case-normalize a variable name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
