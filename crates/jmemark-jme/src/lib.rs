//! jmemark-jme — The JME expression language.
//!
//! Tokenizes, parses, evaluates, renders, and simplifies JME expressions,
//! and exposes all of it to `jmemark-core` through [`JmeEngine`].

pub mod ast;
mod display;
pub mod engine;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod simplify;

pub use ast::Expr;
pub use engine::JmeEngine;
pub use parser::parse;
pub use simplify::Rule;
