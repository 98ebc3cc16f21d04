//! jmemark-core — Answer checking, validation, and credit aggregation.
//!
//! This crate defines the data model, the traits an expression engine
//! implements, and the marking logic built on them: randomized numeric
//! equivalence checking, answer validation, single-answer and gap-fill parts,
//! and question instances with reports.

pub mod checker;
pub mod config;
pub mod error;
pub mod mock;
pub mod model;
pub mod parser;
pub mod part;
pub mod question;
pub mod report;
pub mod sampler;
pub mod scope;
pub mod store;
pub mod traits;
pub mod validator;

pub use checker::{AnswerChecker, CheckOutcome};
pub use config::MarkingConfig;
pub use part::{ExpressionPart, GapFillPart, Markable};
pub use question::Question;
pub use report::MarkingReport;
pub use scope::VariableScope;
pub use traits::{Bindings, Canonicalizer, Evaluator, ExpressionEngine};
