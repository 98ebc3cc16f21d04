//! Markable parts of a question.
//!
//! Every kind of part implements [`Markable`]; a gap-fill part holds a
//! heterogeneous, ordered list of them.

pub mod gapfill;
pub mod jme;

pub use gapfill::{GapFillPart, GapFillState};
pub use jme::{collect_ruleset, ExpressionPart};

use crate::error::MarkingError;
use crate::model::{PartResult, SymbolicAnswer};
use crate::store::AnswerStore;

/// The capability shared by every kind of part.
pub trait Markable: Send {
    /// Path of this part within its question (`p0`, `p1g2`, ...).
    fn id(&self) -> &str;

    /// Maximum marks available, fixed at construction.
    fn marks(&self) -> f64;

    /// Whether the last marked answer was non-empty.
    fn answered(&self) -> bool;

    /// Commit the staged answer and mark it.
    fn mark(&mut self) -> Result<PartResult, MarkingError>;

    /// Show the correct answer. Has no effect on credit.
    fn reveal_answer(&mut self);

    fn is_revealed(&self) -> bool;

    /// Set the answer currently entered, without submitting it.
    fn stage_answer(&mut self, answer: SymbolicAnswer);

    /// Copy the staged answer into the submitted answer.
    fn set_student_answer(&mut self);

    /// The submitted answer as a value a custom marking script could inspect.
    fn student_answer_as_symbolic(&self) -> SymbolicAnswer;

    /// Pre-populate the staged answer from saved state.
    fn resume(&mut self, store: &dyn AnswerStore);

    /// Child parts, in declared order.
    fn gaps(&self) -> &[Box<dyn Markable>] {
        &[]
    }
}

/// Id of the `index`th top-level part.
pub fn part_path(index: usize) -> String {
    format!("p{index}")
}

/// Id of the `index`th gap of `parent`.
pub fn gap_path(parent: &str, index: usize) -> String {
    format!("{parent}g{index}")
}
