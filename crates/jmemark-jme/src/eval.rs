//! Tree-walking evaluator.

use std::f64::consts::{E, PI};

use jmemark_core::error::EvalError;
use jmemark_core::model::{format_number, Value};
use jmemark_core::traits::Bindings;

use crate::ast::{BinaryOp, Expr, UnaryOp};

/// Largest argument whose factorial is a finite `f64`.
const MAX_FACTORIAL: f64 = 170.0;

/// Evaluate a tree against variable bindings.
///
/// Bindings shadow the constants `pi` and `e`. A result that isn't finite is
/// an error.
pub fn evaluate(expr: &Expr, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    let value = eval(expr, bindings)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

fn eval(expr: &Expr, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Name(name) => lookup(name, bindings),
        Expr::Unary { op, operand } => {
            let value = eval(operand, bindings)?;
            match op {
                UnaryOp::Neg => negate(value),
                UnaryOp::Not => Ok(Value::Boolean(!boolean(&value, "not")?)),
            }
        }
        Expr::Binary { op, left, right } => {
            let a = eval(left, bindings)?;
            // `and`/`or` short-circuit
            match (op, &a) {
                (BinaryOp::And, Value::Boolean(false)) => return Ok(Value::Boolean(false)),
                (BinaryOp::Or, Value::Boolean(true)) => return Ok(Value::Boolean(true)),
                _ => {}
            }
            let b = eval(right, bindings)?;
            binary(*op, a, b)
        }
        Expr::Factorial(operand) => {
            let n = number(&eval(operand, bindings)?, "!")?;
            factorial(n).map(Value::Number)
        }
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|a| eval(a, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, values)
        }
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|a| eval(a, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            list(values)
        }
    }
}

fn lookup(name: &str, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    if let Some(value) = bindings.get(name) {
        return Ok(value.clone());
    }
    match name {
        "pi" => Ok(Value::Number(PI)),
        "e" => Ok(Value::Number(E)),
        _ => Err(EvalError::UnknownVariable(name.to_string())),
    }
}

fn number(value: &Value, context: &str) -> Result<f64, EvalError> {
    value.as_number().ok_or_else(|| {
        EvalError::TypeMismatch(format!("{context} expects a number, got a {}", value.kind()))
    })
}

fn boolean(value: &Value, context: &str) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        other => Err(EvalError::TypeMismatch(format!(
            "{context} expects a boolean, got a {}",
            other.kind()
        ))),
    }
}

fn mismatch(op: &str, a: &Value, b: &Value) -> EvalError {
    EvalError::TypeMismatch(format!("can't apply {op} to a {} and a {}", a.kind(), b.kind()))
}

fn domain(function: &str, input: f64) -> EvalError {
    EvalError::Domain {
        function: function.to_string(),
        input: format_number(input),
    }
}

fn negate(value: Value) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) => Ok(Value::Number(-n)),
        Value::Vector(v) => Ok(Value::Vector(v.into_iter().map(|x| -x).collect())),
        Value::Matrix(m) => Ok(Value::Matrix(
            m.into_iter()
                .map(|row| row.into_iter().map(|x| -x).collect())
                .collect(),
        )),
        Value::Boolean(_) => Err(EvalError::TypeMismatch("can't negate a boolean".into())),
    }
}

fn binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => elementwise(a, b, "+", |x, y| x + y),
        BinaryOp::Sub => elementwise(a, b, "-", |x, y| x - y),
        BinaryOp::Mul => multiply(a, b),
        BinaryOp::Div => divide(a, b),
        BinaryOp::Pow => {
            let base = number(&a, "^")?;
            let exponent = number(&b, "^")?;
            if base == 0.0 && exponent < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let result = base.powf(exponent);
            if result.is_nan() {
                return Err(domain("^", base));
            }
            Ok(Value::Number(result))
        }
        BinaryOp::Eq => Ok(Value::Boolean(a == b)),
        BinaryOp::NotEq => Ok(Value::Boolean(a != b)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let symbol = op.symbol();
            let (x, y) = (number(&a, symbol)?, number(&b, symbol)?);
            Ok(Value::Boolean(match op {
                BinaryOp::Less => x < y,
                BinaryOp::LessEq => x <= y,
                BinaryOp::Greater => x > y,
                _ => x >= y,
            }))
        }
        BinaryOp::And => Ok(Value::Boolean(boolean(&a, "and")? && boolean(&b, "and")?)),
        BinaryOp::Or => Ok(Value::Boolean(boolean(&a, "or")? || boolean(&b, "or")?)),
    }
}

fn elementwise(a: Value, b: Value, op: &str, f: impl Fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(f(*x, *y))),
        (Value::Vector(u), Value::Vector(v)) if u.len() == v.len() => Ok(Value::Vector(
            u.iter().zip(v).map(|(x, y)| f(*x, *y)).collect(),
        )),
        (Value::Matrix(p), Value::Matrix(q))
            if p.len() == q.len() && p.iter().zip(q).all(|(r, s)| r.len() == s.len()) =>
        {
            Ok(Value::Matrix(
                p.iter()
                    .zip(q)
                    .map(|(r, s)| r.iter().zip(s).map(|(x, y)| f(*x, *y)).collect())
                    .collect(),
            ))
        }
        _ => Err(mismatch(op, &a, &b)),
    }
}

fn scale(value: Value, k: f64) -> Value {
    match value {
        Value::Number(n) => Value::Number(n * k),
        Value::Vector(v) => Value::Vector(v.into_iter().map(|x| x * k).collect()),
        Value::Matrix(m) => Value::Matrix(
            m.into_iter()
                .map(|row| row.into_iter().map(|x| x * k).collect())
                .collect(),
        ),
        other => other,
    }
}

fn multiply(a: Value, b: Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Number(k), v @ (Value::Number(_) | Value::Vector(_) | Value::Matrix(_)))
        | (v @ (Value::Vector(_) | Value::Matrix(_)), Value::Number(k)) => Ok(scale(v, k)),
        (Value::Matrix(m), Value::Vector(v)) => {
            if m.iter().any(|row| row.len() != v.len()) {
                return Err(EvalError::TypeMismatch(format!(
                    "can't multiply a matrix by a vector of length {}",
                    v.len()
                )));
            }
            Ok(Value::Vector(
                m.iter()
                    .map(|row| row.iter().zip(&v).map(|(x, y)| x * y).sum())
                    .collect(),
            ))
        }
        (Value::Matrix(p), Value::Matrix(q)) => {
            let inner = q.len();
            if p.iter().any(|row| row.len() != inner) {
                return Err(EvalError::TypeMismatch(
                    "matrix dimensions don't match for multiplication".into(),
                ));
            }
            let cols = q.first().map_or(0, Vec::len);
            Ok(Value::Matrix(
                p.iter()
                    .map(|row| {
                        (0..cols)
                            .map(|j| (0..inner).map(|k| row[k] * q[k][j]).sum())
                            .collect()
                    })
                    .collect(),
            ))
        }
        (a, b) => Err(mismatch("*", &a, &b)),
    }
}

fn divide(a: Value, b: Value) -> Result<Value, EvalError> {
    let divisor = match &b {
        Value::Number(d) => *d,
        _ => return Err(mismatch("/", &a, &b)),
    };
    if divisor == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    match a {
        Value::Number(n) => Ok(Value::Number(n / divisor)),
        v @ (Value::Vector(_) | Value::Matrix(_)) => Ok(scale(v, 1.0 / divisor)),
        other => Err(mismatch("/", &other, &b)),
    }
}

fn factorial(n: f64) -> Result<f64, EvalError> {
    if n < 0.0 || n.fract() != 0.0 {
        return Err(domain("fact", n));
    }
    if n > MAX_FACTORIAL {
        return Err(EvalError::NonFinite);
    }
    Ok((2..=n as u64).map(|k| k as f64).product())
}

fn list(values: Vec<Value>) -> Result<Value, EvalError> {
    if values.iter().all(|v| matches!(v, Value::Number(_))) {
        return Ok(Value::Vector(
            values.iter().filter_map(Value::as_number).collect(),
        ));
    }
    let rows = values
        .into_iter()
        .map(|v| match v {
            Value::Vector(row) => Ok(row),
            other => Err(EvalError::TypeMismatch(format!(
                "a list can't mix a {} with other values",
                other.kind()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    matrix(rows)
}

fn matrix(rows: Vec<Vec<f64>>) -> Result<Value, EvalError> {
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != width) {
        return Err(EvalError::TypeMismatch(
            "matrix rows must all have the same length".into(),
        ));
    }
    Ok(Value::Matrix(rows))
}

fn arity(function: &str, expected: usize, args: &[Value]) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            function: function.to_string(),
            expected,
            got: args.len(),
        })
    }
}

fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match name {
        "vector" => {
            let items = args
                .iter()
                .map(|a| number(a, "vector"))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Vector(items));
        }
        "matrix" => {
            let rows = args
                .into_iter()
                .map(|a| match a {
                    Value::Vector(row) => Ok(row),
                    other => Err(EvalError::TypeMismatch(format!(
                        "matrix expects vector rows, got a {}",
                        other.kind()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return matrix(rows);
        }
        "dot" => {
            arity(name, 2, &args)?;
            return match (&args[0], &args[1]) {
                (Value::Vector(u), Value::Vector(v)) if u.len() == v.len() => {
                    Ok(Value::Number(u.iter().zip(v).map(|(x, y)| x * y).sum()))
                }
                (a, b) => Err(mismatch("dot", a, b)),
            };
        }
        "abs" => {
            arity(name, 1, &args)?;
            return match &args[0] {
                Value::Number(n) => Ok(Value::Number(n.abs())),
                Value::Vector(v) => Ok(Value::Number(v.iter().map(|x| x * x).sum::<f64>().sqrt())),
                other => Err(EvalError::TypeMismatch(format!(
                    "abs expects a number or vector, got a {}",
                    other.kind()
                ))),
            };
        }
        "log" if args.len() == 2 => {
            let x = number(&args[0], name)?;
            let base = number(&args[1], name)?;
            if x <= 0.0 {
                return Err(domain(name, x));
            }
            if base <= 0.0 || base == 1.0 {
                return Err(domain(name, base));
            }
            return Ok(Value::Number(x.ln() / base.ln()));
        }
        "root" => {
            arity(name, 2, &args)?;
            let x = number(&args[0], name)?;
            let n = number(&args[1], name)?;
            return root(x, n).map(Value::Number);
        }
        _ => {}
    }

    arity(name, 1, &args)?;
    let x = number(&args[0], name)?;
    let result = match name {
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "sec" => reciprocal(x.cos())?,
        "csc" => reciprocal(x.sin())?,
        "cot" => reciprocal(x.tan())?,
        "arcsin" | "arccos" if !(-1.0..=1.0).contains(&x) => return Err(domain(name, x)),
        "arcsin" => x.asin(),
        "arccos" => x.acos(),
        "arctan" => x.atan(),
        "sinh" => x.sinh(),
        "cosh" => x.cosh(),
        "tanh" => x.tanh(),
        "exp" => x.exp(),
        "ln" | "log" if x <= 0.0 => return Err(domain(name, x)),
        "ln" => x.ln(),
        "log" => x.log10(),
        "sqrt" if x < 0.0 => return Err(domain(name, x)),
        "sqrt" => x.sqrt(),
        "fact" => factorial(x)?,
        _ => return Err(EvalError::UnknownFunction(name.to_string())),
    };
    Ok(Value::Number(result))
}

fn reciprocal(x: f64) -> Result<f64, EvalError> {
    if x == 0.0 {
        Err(EvalError::DivisionByZero)
    } else {
        Ok(1.0 / x)
    }
}

/// The real `n`th root; odd roots of negative numbers are negative.
fn root(x: f64, n: f64) -> Result<f64, EvalError> {
    if n == 0.0 {
        return Err(domain("root", n));
    }
    if x >= 0.0 {
        return Ok(x.powf(1.0 / n));
    }
    if n.fract() == 0.0 && (n as i64) % 2 != 0 {
        Ok(-(-x).powf(1.0 / n))
    } else {
        Err(domain("root", x))
    }
}
