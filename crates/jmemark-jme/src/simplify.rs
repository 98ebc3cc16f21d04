//! Rule-based simplification of expression trees.
//!
//! Rules rewrite a single node. Each pass rewrites bottom-up, and passes
//! repeat until nothing changes. A rule must give the same value as the node
//! it replaces wherever that node is defined.

use std::fmt;

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Upper bound on simplification passes.
const MAX_PASSES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Sign tidying: `a+(-b)` → `a-b`, `--a` → `a`, `(-a)*b` → `-(a*b)`.
    Basic,
    /// `1*x` → `x`
    UnitFactor,
    /// `x^1` → `x`
    UnitPower,
    /// `x/1` → `x`
    UnitDenominator,
    /// `0*x` → `0`, `0/x` → `0`
    ZeroFactor,
    /// `0+x` → `x`, `x-0` → `x`
    ZeroTerm,
    /// `x^0` → `1`
    ZeroPower,
    /// Folds arithmetic on literal numbers.
    CollectNumbers,
    /// `0^x` → `0`
    ZeroBase,
    /// `x*2` → `2x`
    ConstantsFirst,
    /// `sqrt(a)*sqrt(b)` → `sqrt(a*b)`
    SqrtProduct,
    /// `sqrt(a)/sqrt(b)` → `sqrt(a/b)`
    SqrtDivision,
    /// `sqrt(x^2)` → `abs(x)`, `sqrt(x)^2` → `x`, `sqrt(9)` → `3`
    SqrtSquare,
    /// Folds whole-number powers of literal numbers.
    OtherNumbers,
}

impl Rule {
    pub const ALL: [Rule; 14] = [
        Rule::Basic,
        Rule::UnitFactor,
        Rule::UnitPower,
        Rule::UnitDenominator,
        Rule::ZeroFactor,
        Rule::ZeroTerm,
        Rule::ZeroPower,
        Rule::CollectNumbers,
        Rule::ZeroBase,
        Rule::ConstantsFirst,
        Rule::SqrtProduct,
        Rule::SqrtDivision,
        Rule::SqrtSquare,
        Rule::OtherNumbers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rule::Basic => "basic",
            Rule::UnitFactor => "unitFactor",
            Rule::UnitPower => "unitPower",
            Rule::UnitDenominator => "unitDenominator",
            Rule::ZeroFactor => "zeroFactor",
            Rule::ZeroTerm => "zeroTerm",
            Rule::ZeroPower => "zeroPower",
            Rule::CollectNumbers => "collectNumbers",
            Rule::ZeroBase => "zeroBase",
            Rule::ConstantsFirst => "constantsFirst",
            Rule::SqrtProduct => "sqrtProduct",
            Rule::SqrtDivision => "sqrtDivision",
            Rule::SqrtSquare => "sqrtSquare",
            Rule::OtherNumbers => "otherNumbers",
        }
    }

    /// Look a rule up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Rule> {
        Rule::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name.trim()))
    }

    fn apply(self, expr: &Expr) -> Option<Expr> {
        match self {
            Rule::Basic => basic(expr),
            Rule::UnitFactor => match binary(expr)? {
                (BinaryOp::Mul, l, r) if is_number(l, 1.0) => Some(r.clone()),
                (BinaryOp::Mul, l, r) if is_number(r, 1.0) => Some(l.clone()),
                _ => None,
            },
            Rule::UnitPower => match binary(expr)? {
                (BinaryOp::Pow, l, r) if is_number(r, 1.0) => Some(l.clone()),
                _ => None,
            },
            Rule::UnitDenominator => match binary(expr)? {
                (BinaryOp::Div, l, r) if is_number(r, 1.0) => Some(l.clone()),
                _ => None,
            },
            Rule::ZeroFactor => match binary(expr)? {
                (BinaryOp::Mul, l, r)
                    if (is_number(l, 0.0) && is_scalar(r)) || (is_number(r, 0.0) && is_scalar(l)) =>
                {
                    Some(Expr::Number(0.0))
                }
                (BinaryOp::Div, l, r) if is_number(l, 0.0) && is_scalar(r) => Some(Expr::Number(0.0)),
                _ => None,
            },
            Rule::ZeroTerm => match binary(expr)? {
                (BinaryOp::Add, l, r) if is_number(l, 0.0) => Some(r.clone()),
                (BinaryOp::Add | BinaryOp::Sub, l, r) if is_number(r, 0.0) => Some(l.clone()),
                (BinaryOp::Sub, l, r) if is_number(l, 0.0) => Some(Expr::neg(r.clone())),
                _ => None,
            },
            Rule::ZeroPower => match binary(expr)? {
                (BinaryOp::Pow, l, r) if is_number(r, 0.0) && is_scalar(l) => Some(Expr::Number(1.0)),
                _ => None,
            },
            Rule::CollectNumbers => collect_numbers(expr),
            Rule::ZeroBase => match binary(expr)? {
                (BinaryOp::Pow, l, r) if is_number(l, 0.0) && is_scalar(r) => Some(Expr::Number(0.0)),
                _ => None,
            },
            Rule::ConstantsFirst => match binary(expr)? {
                (BinaryOp::Mul, l, r @ Expr::Number(_)) if !matches!(l, Expr::Number(_)) => {
                    Some(Expr::binary(BinaryOp::Mul, r.clone(), l.clone()))
                }
                _ => None,
            },
            Rule::SqrtProduct => match binary(expr)? {
                (BinaryOp::Mul, l, r) => {
                    let (a, b) = (sqrt_arg(l)?, sqrt_arg(r)?);
                    Some(sqrt(Expr::binary(BinaryOp::Mul, a.clone(), b.clone())))
                }
                _ => None,
            },
            Rule::SqrtDivision => match binary(expr)? {
                (BinaryOp::Div, l, r) => {
                    let (a, b) = (sqrt_arg(l)?, sqrt_arg(r)?);
                    Some(sqrt(Expr::binary(BinaryOp::Div, a.clone(), b.clone())))
                }
                _ => None,
            },
            Rule::SqrtSquare => sqrt_square(expr),
            Rule::OtherNumbers => match binary(expr)? {
                (BinaryOp::Pow, Expr::Number(a), Expr::Number(b)) => {
                    whole(a.powf(*b)).map(Expr::Number)
                }
                _ => None,
            },
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Simplify a tree with the given rules, repeating until nothing changes.
pub fn simplify(expr: Expr, rules: &[Rule]) -> Expr {
    if rules.is_empty() {
        return expr;
    }
    let mut current = expr;
    for _ in 0..MAX_PASSES {
        let next = rewrite(&current, rules);
        if next == current {
            return current;
        }
        current = next;
    }
    tracing::debug!(expr = %current, "simplification stopped before reaching a fixpoint");
    current
}

/// One bottom-up pass: children first, then the first rule that matches.
fn rewrite(expr: &Expr, rules: &[Rule]) -> Expr {
    let node = match expr {
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(rewrite(operand, rules)),
        },
        Expr::Binary { op, left, right } => {
            Expr::binary(*op, rewrite(left, rules), rewrite(right, rules))
        }
        Expr::Factorial(operand) => Expr::Factorial(Box::new(rewrite(operand, rules))),
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(|a| rewrite(a, rules)).collect(),
        },
        Expr::List(items) => Expr::List(items.iter().map(|a| rewrite(a, rules)).collect()),
        leaf => leaf.clone(),
    };
    rules.iter().find_map(|r| r.apply(&node)).unwrap_or(node)
}

fn binary(expr: &Expr) -> Option<(BinaryOp, &Expr, &Expr)> {
    match expr {
        Expr::Binary { op, left, right } => Some((*op, left, right)),
        _ => None,
    }
}

fn negated(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Some(operand),
        _ => None,
    }
}

fn is_number(expr: &Expr, value: f64) -> bool {
    matches!(expr, Expr::Number(n) if *n == value)
}

/// Whether the tree can't produce a vector or matrix, so replacing it by a
/// number keeps its kind. Variables are sampled as numbers.
fn is_scalar(expr: &Expr) -> bool {
    match expr {
        Expr::List(_) => false,
        Expr::Call { name, args } => name != "vector" && name != "matrix" && args.iter().all(is_scalar),
        Expr::Unary { operand, .. } | Expr::Factorial(operand) => is_scalar(operand),
        Expr::Binary { left, right, .. } => is_scalar(left) && is_scalar(right),
        Expr::Name(_) | Expr::Number(_) | Expr::Boolean(_) => true,
    }
}

fn sqrt(arg: Expr) -> Expr {
    Expr::call("sqrt", vec![arg])
}

fn sqrt_arg(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Call { name, args } if name == "sqrt" && args.len() == 1 => Some(&args[0]),
        _ => None,
    }
}

/// `n` if it is a whole number small enough to print exactly.
fn whole(n: f64) -> Option<f64> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15).then_some(n)
}

fn basic(expr: &Expr) -> Option<Expr> {
    if let Some(inner) = negated(expr) {
        return negated(inner).cloned();
    }
    let (op, l, r) = binary(expr)?;
    match op {
        BinaryOp::Add => {
            if let Some(b) = negated(r) {
                return Some(Expr::binary(BinaryOp::Sub, l.clone(), b.clone()));
            }
            if let Expr::Number(n) = r {
                if *n < 0.0 {
                    return Some(Expr::binary(BinaryOp::Sub, l.clone(), Expr::Number(-n)));
                }
            }
            negated(l).map(|a| Expr::binary(BinaryOp::Sub, r.clone(), a.clone()))
        }
        BinaryOp::Sub => {
            if let Some(b) = negated(r) {
                return Some(Expr::binary(BinaryOp::Add, l.clone(), b.clone()));
            }
            match r {
                Expr::Number(n) if *n < 0.0 => {
                    Some(Expr::binary(BinaryOp::Add, l.clone(), Expr::Number(-n)))
                }
                _ => None,
            }
        }
        BinaryOp::Mul | BinaryOp::Div => {
            if let Some(a) = negated(l) {
                return Some(Expr::neg(Expr::binary(op, a.clone(), r.clone())));
            }
            negated(r).map(|b| Expr::neg(Expr::binary(op, l.clone(), b.clone())))
        }
        _ => None,
    }
}

fn collect_numbers(expr: &Expr) -> Option<Expr> {
    if let Some(Expr::Number(n)) = negated(expr) {
        return Some(Expr::Number(-n));
    }
    match binary(expr)? {
        (BinaryOp::Add, Expr::Number(a), Expr::Number(b)) => Some(Expr::Number(a + b)),
        (BinaryOp::Sub, Expr::Number(a), Expr::Number(b)) => Some(Expr::Number(a - b)),
        (BinaryOp::Mul, Expr::Number(a), Expr::Number(b)) => Some(Expr::Number(a * b)),
        (BinaryOp::Div, Expr::Number(a), Expr::Number(b)) if *b != 0.0 => {
            whole(a / b).filter(|q| q * b == *a).map(Expr::Number)
        }
        // 2*(3*x) → 6*x
        (BinaryOp::Mul, Expr::Number(a), inner) => match binary(inner)? {
            (BinaryOp::Mul, Expr::Number(b), x) => Some(Expr::binary(
                BinaryOp::Mul,
                Expr::Number(a * b),
                x.clone(),
            )),
            _ => None,
        },
        _ => None,
    }
}

fn sqrt_square(expr: &Expr) -> Option<Expr> {
    if let Some(arg) = sqrt_arg(expr) {
        return match arg {
            Expr::Number(n) if *n >= 0.0 => whole(n.sqrt())
                .filter(|r| r * r == *n)
                .map(Expr::Number),
            _ => match binary(arg)? {
                (BinaryOp::Pow, x, two) if is_number(two, 2.0) => {
                    Some(Expr::call("abs", vec![x.clone()]))
                }
                _ => None,
            },
        };
    }
    match binary(expr)? {
        (BinaryOp::Pow, base, two) if is_number(two, 2.0) => sqrt_arg(base).cloned(),
        _ => None,
    }
}
