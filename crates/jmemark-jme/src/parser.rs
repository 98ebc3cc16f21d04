//! Recursive-descent parser for JME expressions.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or := and ("or" and)*
//! and := not ("and" not)*
//! not := "not" not | comparison
//! comparison := additive (("=" | "<>" | "<" | "<=" | ">" | ">=") additive)*
//! additive := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/") unary | power)*
//! unary := ("-" | "+") unary | power
//! power := postfix ("^" unary)?
//! postfix := primary "!"*
//! ```
//!
//! The bare `power` alternative in `multiplicative` is implicit
//! multiplication: `2x`, `2(x+1)`, `(a)(b)`, `x y`.
//!
//! Trees are at most [`MAX_DEPTH`] levels deep, so evaluating, rendering,
//! simplifying and dropping them can't exhaust the stack.

use jmemark_core::error::ParseError;

use crate::ast::{is_function, BinaryOp, Expr, UnaryOp};
use crate::lexer::{tokenize, Spanned, Token};

/// Deepest nesting of operators, brackets and calls a parsed tree may have.
pub const MAX_DEPTH: usize = 128;

/// Parse JME text into an expression tree.
pub fn parse(text: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::new("empty expression", 0));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
    };
    let expr = parser.parse_or()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    end: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'t Spanned> {
        let spanned = self.tokens.get(self.pos);
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn unexpected(&self) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(s) => ParseError::new(format!("unexpected `{}`", s.token), s.position),
            None => ParseError::new("unexpected end of expression", self.end),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            let found = match self.peek() {
                Some(t) => format!("`{t}`"),
                None => "the end of the expression".to_string(),
            };
            Err(ParseError::new(
                format!("expected `{token}` but found {found}"),
                self.position(),
            ))
        }
    }

    /// Go one level deeper, failing once the tree would exceed [`MAX_DEPTH`].
    fn descend(&mut self, position: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new("expression is too deeply nested", position));
        }
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        let mut levels = 0;
        while self.eat(&Token::Or) {
            self.descend(self.position())?;
            levels += 1;
            let right = self.parse_and()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        let mut levels = 0;
        while self.eat(&Token::And) {
            self.descend(self.position())?;
            levels += 1;
            let right = self.parse_not()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        let start = self.position();
        if self.eat(&Token::Not) {
            self.descend(start)?;
            let operand = self.parse_not()?;
            self.ascend(1);
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        let mut levels = 0;
        while let Some(op) = self.peek().and_then(comparison_op) {
            self.descend(self.position())?;
            levels += 1;
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::binary(op, left, right);
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.descend(self.position())?;
            levels += 1;
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Some(BinaryOp::Mul),
                Some(Token::Slash) => Some(BinaryOp::Div),
                Some(t) if t.starts_operand() => None,
                _ => break,
            };
            self.descend(self.position())?;
            levels += 1;
            let (op, right) = match op {
                Some(op) => {
                    self.pos += 1;
                    (op, self.parse_unary()?)
                }
                // implicit multiplication
                None => (BinaryOp::Mul, self.parse_power()?),
            };
            left = Expr::binary(op, left, right);
        }
        self.ascend(levels);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.position();
        if self.eat(&Token::Minus) {
            self.descend(start)?;
            let operand = self.parse_unary()?;
            self.ascend(1);
            return Ok(Expr::neg(operand));
        }
        if self.eat(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        let start = self.position();
        if self.eat(&Token::Caret) {
            self.descend(start)?;
            let exponent = self.parse_unary()?;
            self.ascend(1);
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut levels = 0;
        while self.peek() == Some(&Token::Bang) {
            self.descend(self.position())?;
            levels += 1;
            self.pos += 1;
            expr = Expr::Factorial(Box::new(expr));
        }
        self.ascend(levels);
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(spanned) = self.advance() else {
            return Err(self.unexpected());
        };
        match &spanned.token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Boolean(b) => Ok(Expr::Boolean(*b)),
            Token::Name(name) => {
                if is_function(name) && self.eat(&Token::OpenParen) {
                    self.descend(spanned.position)?;
                    let args = self.parse_list(&Token::CloseParen)?;
                    self.ascend(1);
                    Ok(Expr::Call {
                        name: name.clone(),
                        args,
                    })
                } else {
                    Ok(Expr::Name(name.clone()))
                }
            }
            Token::OpenParen => {
                self.descend(spanned.position)?;
                let inner = self.parse_or()?;
                self.expect(&Token::CloseParen)?;
                self.ascend(1);
                Ok(inner)
            }
            Token::OpenBracket => {
                self.descend(spanned.position)?;
                let items = self.parse_list(&Token::CloseBracket)?;
                self.ascend(1);
                Ok(Expr::List(items))
            }
            other => Err(ParseError::new(
                format!("unexpected `{other}`"),
                spanned.position,
            )),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}

fn comparison_op(token: &Token) -> Option<BinaryOp> {
    match token {
        Token::Eq => Some(BinaryOp::Eq),
        Token::NotEq => Some(BinaryOp::NotEq),
        Token::Less => Some(BinaryOp::Less),
        Token::LessEq => Some(BinaryOp::LessEq),
        Token::Greater => Some(BinaryOp::Greater),
        Token::GreaterEq => Some(BinaryOp::GreaterEq),
        _ => None,
    }
}
