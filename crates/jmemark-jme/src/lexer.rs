//! Tokenizer for JME expression text.

use std::fmt;

use logos::Logos;

use jmemark_core::error::ParseError;

/// A lexical token of a JME expression.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    /// Numeric literals such as `2`, `2.5`, `2.` or `.5`. There is no exponent
    /// notation: `2e` is two times `e`.
    #[regex(r"[0-9]+(\.[0-9]*)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// Variable, constant or function names. Names are case-insensitive and
    /// stored lower-cased.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*'*", |lex| lex.slice().to_lowercase())]
    Name(String),

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),

    #[token("and")]
    And,

    #[token("or")]
    Or,

    #[token("not")]
    Not,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("^")]
    Caret,

    #[token("!")]
    Bang,

    #[token("=")]
    Eq,

    #[token("<>")]
    NotEq,

    #[token("<")]
    Less,

    #[token("<=")]
    LessEq,

    #[token(">")]
    Greater,

    #[token(">=")]
    GreaterEq,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[token("[")]
    OpenBracket,

    #[token("]")]
    CloseBracket,

    #[token(",")]
    Comma,
}

impl Token {
    /// Whether this token can begin an operand, which is what allows implicit
    /// multiplication (`2x`, `(a)(b)`).
    pub fn starts_operand(&self) -> bool {
        matches!(
            self,
            Token::Number(_) | Token::Name(_) | Token::OpenParen | Token::OpenBracket
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Name(name) => write!(f, "{name}"),
            Token::Boolean(b) => write!(f, "{b}"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::Bang => write!(f, "!"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "<>"),
            Token::Less => write!(f, "<"),
            Token::LessEq => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEq => write!(f, ">="),
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::OpenBracket => write!(f, "["),
            Token::CloseBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Split text into tokens, skipping whitespace.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let position = lexer.span().start;
        match result {
            Ok(token) => tokens.push(Spanned { token, position }),
            Err(()) => {
                return Err(ParseError::new(
                    format!("unexpected character `{}`", lexer.slice()),
                    position,
                ))
            }
        }
    }

    Ok(tokens)
}
