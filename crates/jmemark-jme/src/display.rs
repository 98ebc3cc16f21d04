//! Rendering trees back to JME text with as few brackets as possible.
//!
//! The output parses back to the tree it was rendered from.

use std::fmt;

use jmemark_core::model::format_number;

use crate::ast::{BinaryOp, Expr, UnaryOp};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", format_number(*n)),
            Expr::Boolean(b) => write!(f, "{b}"),
            Expr::Name(name) => write!(f, "{name}"),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                write!(f, "-")?;
                bracketed(f, operand, operand.precedence() < 7 || is_negative(operand))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                write!(f, "not ")?;
                bracketed(f, operand, operand.precedence() < 4)
            }
            Expr::Binary { op, left, right } => {
                let p = op.precedence();
                let (left_brackets, right_brackets) = if *op == BinaryOp::Pow {
                    (left.precedence() <= p, right.precedence() < p)
                } else {
                    // left-associative: an equal-precedence right operand
                    // only reads back with brackets
                    (
                        left.precedence() < p,
                        right.precedence() <= p || is_negative(right),
                    )
                };
                bracketed(f, left, left_brackets)?;
                if *op == BinaryOp::Mul && juxtaposes(left, right, right_brackets) {
                    return bracketed(f, right, right_brackets);
                }
                write!(f, "{}", op.symbol())?;
                bracketed(f, right, right_brackets)
            }
            Expr::Factorial(operand) => {
                bracketed(f, operand, operand.precedence() < 10)?;
                write!(f, "!")
            }
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
        }
    }
}

fn bracketed(f: &mut fmt::Formatter<'_>, expr: &Expr, brackets: bool) -> fmt::Result {
    if brackets {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn is_negative(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Unary {
            op: UnaryOp::Neg,
            ..
        }
    ) || matches!(expr, Expr::Number(n) if *n < 0.0)
}

/// Whether `left*right` can be written `left right` (`2x`, `3sin(x)`,
/// `2(x+1)`) and still read back the same.
fn juxtaposes(left: &Expr, right: &Expr, right_brackets: bool) -> bool {
    if !matches!(left, Expr::Number(n) if *n >= 0.0) {
        return false;
    }
    right_brackets || starts_with_name(right)
}

fn starts_with_name(expr: &Expr) -> bool {
    match expr {
        Expr::Name(_) | Expr::Call { .. } => true,
        Expr::Binary {
            op: BinaryOp::Pow,
            left,
            ..
        } => left.precedence() > BinaryOp::Pow.precedence() && starts_with_name(left),
        Expr::Factorial(operand) => starts_with_name(operand),
        _ => false,
    }
}
