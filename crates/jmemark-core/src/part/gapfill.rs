//! Composite part made of an ordered list of gaps.
//!
//! Each gap is an independent part with its own marks. The composite's score
//! is the sum of its gaps' scores, and its feedback is every gap's feedback
//! tagged with the gap's index.

use crate::error::MarkingError;
use crate::model::{Feedback, PartResult, SymbolicAnswer};
use crate::store::AnswerStore;

use super::Markable;

/// How much of a gap-fill part has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFillState {
    Unanswered,
    PartiallyAnswered,
    FullyAnswered,
}

/// A part whose score is the sum of its gaps' scores.
pub struct GapFillPart {
    id: String,
    gaps: Vec<Box<dyn Markable>>,
    answered: bool,
    revealed: bool,
}

impl GapFillPart {
    pub fn new(id: impl Into<String>, gaps: Vec<Box<dyn Markable>>) -> Self {
        Self {
            id: id.into(),
            gaps,
            answered: false,
            revealed: false,
        }
    }

    pub fn gaps_mut(&mut self) -> &mut [Box<dyn Markable>] {
        &mut self.gaps
    }

    pub fn state(&self) -> GapFillState {
        let answered = self.gaps.iter().filter(|g| g.answered()).count();
        if answered == 0 {
            GapFillState::Unanswered
        } else if answered == self.gaps.len() {
            GapFillState::FullyAnswered
        } else {
            GapFillState::PartiallyAnswered
        }
    }
}

impl Markable for GapFillPart {
    fn id(&self) -> &str {
        &self.id
    }

    fn marks(&self) -> f64 {
        self.gaps.iter().map(|g| g.marks()).sum()
    }

    fn answered(&self) -> bool {
        self.answered
    }

    fn mark(&mut self) -> Result<PartResult, MarkingError> {
        let total = self.marks();
        let multiple = self.gaps.len() > 1;
        let mut result = PartResult::new(total);
        let mut score = 0.0;
        let mut all_answered = !self.gaps.is_empty();

        for (i, gap) in self.gaps.iter_mut().enumerate() {
            let gap_result = match gap.mark() {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(part = %self.id, gap = i, error = %e, "gap could not be marked");
                    let mut r = PartResult::new(gap.marks());
                    r.feedback.push(Feedback::invalid(e.to_string()));
                    r
                }
            };

            score += gap_result.score();
            all_answered &= gap_result.answered;

            if multiple {
                result
                    .feedback
                    .push(Feedback::header(format!("Gap {}", i + 1)).tagged(i));
            }
            result
                .feedback
                .extend(gap_result.feedback.iter().map(|f| f.tagged(i)));
        }

        if total > 0.0 {
            result.credit = (score / total).clamp(0.0, 1.0);
            result.answered = all_answered;
        } else {
            result.credit = 0.0;
            result.answered = false;
        }
        self.answered = result.answered;

        tracing::debug!(
            part = %self.id,
            gaps = self.gaps.len(),
            credit = result.credit,
            state = ?self.state(),
            "marked gap-fill part"
        );
        Ok(result)
    }

    fn reveal_answer(&mut self) {
        for gap in &mut self.gaps {
            gap.reveal_answer();
        }
        self.revealed = true;
    }

    fn is_revealed(&self) -> bool {
        self.revealed
    }

    fn stage_answer(&mut self, answer: SymbolicAnswer) {
        match answer {
            SymbolicAnswer::List(answers) => {
                for (gap, answer) in self.gaps.iter_mut().zip(answers) {
                    gap.stage_answer(answer);
                }
            }
            SymbolicAnswer::Text(_) => {
                tracing::warn!(part = %self.id, "ignoring a single answer staged on a gap-fill part");
            }
        }
    }

    fn set_student_answer(&mut self) {
        for gap in &mut self.gaps {
            gap.set_student_answer();
        }
    }

    fn student_answer_as_symbolic(&self) -> SymbolicAnswer {
        SymbolicAnswer::List(
            self.gaps
                .iter()
                .map(|g| g.student_answer_as_symbolic())
                .collect(),
        )
    }

    fn resume(&mut self, store: &dyn AnswerStore) {
        for gap in &mut self.gaps {
            gap.resume(store);
        }
    }

    fn gaps(&self) -> &[Box<dyn Markable>] {
        &self.gaps
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::FeedbackKind;
    use crate::store::JsonAnswerStore;

    /// A gap that always returns the same credit.
    struct FixedPart {
        id: String,
        marks: f64,
        credit: f64,
        answered: bool,
        staged: String,
        submitted: String,
        revealed: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FixedPart {
        fn boxed(id: &str, marks: f64, credit: f64) -> Box<dyn Markable> {
            Box::new(Self::new(id, marks, credit, Arc::default()))
        }

        fn new(id: &str, marks: f64, credit: f64, log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                id: id.to_string(),
                marks,
                credit,
                answered: false,
                staged: String::new(),
                submitted: String::new(),
                revealed: false,
                log,
            }
        }
    }

    impl Markable for FixedPart {
        fn id(&self) -> &str {
            &self.id
        }
        fn marks(&self) -> f64 {
            self.marks
        }
        fn answered(&self) -> bool {
            self.answered
        }
        fn mark(&mut self) -> Result<PartResult, MarkingError> {
            self.set_student_answer();
            self.answered = true;
            let mut r = PartResult::new(self.marks);
            r.answered = true;
            r.set_credit(self.credit, format!("{} marked", self.id));
            Ok(r)
        }
        fn reveal_answer(&mut self) {
            self.log.lock().unwrap().push(self.id.clone());
            self.revealed = true;
        }
        fn is_revealed(&self) -> bool {
            self.revealed
        }
        fn stage_answer(&mut self, answer: SymbolicAnswer) {
            if let SymbolicAnswer::Text(text) = answer {
                self.staged = text;
            }
        }
        fn set_student_answer(&mut self) {
            self.submitted = self.staged.clone();
        }
        fn student_answer_as_symbolic(&self) -> SymbolicAnswer {
            SymbolicAnswer::Text(self.submitted.clone())
        }
        fn resume(&mut self, store: &dyn AnswerStore) {
            if let Some(s) = store.load(&self.id) {
                self.staged = s.student_answer;
            }
        }
    }

    struct FailingPart;

    impl Markable for FailingPart {
        fn id(&self) -> &str {
            "p0g1"
        }
        fn marks(&self) -> f64 {
            1.0
        }
        fn answered(&self) -> bool {
            false
        }
        fn mark(&mut self) -> Result<PartResult, MarkingError> {
            Err(MarkingError::NoReference("p0g1".into()))
        }
        fn reveal_answer(&mut self) {}
        fn is_revealed(&self) -> bool {
            false
        }
        fn stage_answer(&mut self, _answer: SymbolicAnswer) {}
        fn set_student_answer(&mut self) {}
        fn student_answer_as_symbolic(&self) -> SymbolicAnswer {
            SymbolicAnswer::Text(String::new())
        }
        fn resume(&mut self, _store: &dyn AnswerStore) {}
    }

    #[test]
    fn credit_is_weighted_by_gap_marks() {
        let mut part = GapFillPart::new(
            "p0",
            vec![
                FixedPart::boxed("p0g0", 2.0, 1.0),
                FixedPart::boxed("p0g1", 1.0, 0.5),
                FixedPart::boxed("p0g2", 1.0, 0.0),
            ],
        );
        assert!((part.marks() - 4.0).abs() < f64::EPSILON);

        let result = part.mark().unwrap();
        assert!((result.credit - 0.625).abs() < 1e-12);
        assert!((result.score() - 2.5).abs() < 1e-12);
        assert!(result.answered);
        assert_eq!(part.state(), GapFillState::FullyAnswered);
    }

    #[test]
    fn zero_mark_composite_is_unanswered_with_no_credit() {
        let mut part = GapFillPart::new(
            "p0",
            vec![
                FixedPart::boxed("p0g0", 0.0, 1.0),
                FixedPart::boxed("p0g1", 0.0, 1.0),
            ],
        );
        let result = part.mark().unwrap();
        assert_eq!(result.credit, 0.0);
        assert!(!result.answered);
        assert!(!result.score().is_nan());
    }

    #[test]
    fn feedback_is_tagged_with_gap_index() {
        let mut part = GapFillPart::new(
            "p0",
            vec![
                FixedPart::boxed("p0g0", 1.0, 1.0),
                FixedPart::boxed("p0g1", 1.0, 0.0),
                FixedPart::boxed("p0g2", 1.0, 1.0),
            ],
        );
        let result = part.mark().unwrap();

        let headers: Vec<(&str, Option<usize>)> = result
            .feedback
            .iter()
            .filter(|f| f.kind == FeedbackKind::Header)
            .map(|f| (f.message.as_str(), f.gap))
            .collect();
        assert_eq!(
            headers,
            vec![("Gap 1", Some(0)), ("Gap 2", Some(1)), ("Gap 3", Some(2))]
        );

        let tags: Vec<Option<usize>> = result
            .feedback
            .iter()
            .filter(|f| f.kind != FeedbackKind::Header)
            .map(|f| f.gap)
            .collect();
        assert_eq!(tags, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn single_gap_has_no_header() {
        let mut part = GapFillPart::new("p0", vec![FixedPart::boxed("p0g0", 1.0, 1.0)]);
        let result = part.mark().unwrap();
        assert!(result
            .feedback
            .iter()
            .all(|f| f.kind != FeedbackKind::Header && f.gap == Some(0)));
    }

    #[test]
    fn reveal_delegates_to_each_gap_once_in_order() {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let gaps: Vec<Box<dyn Markable>> = ["p0g0", "p0g1", "p0g2"]
            .iter()
            .map(|id| Box::new(FixedPart::new(id, 1.0, 1.0, log.clone())) as Box<dyn Markable>)
            .collect();
        let mut part = GapFillPart::new("p0", gaps);

        part.reveal_answer();
        assert!(part.is_revealed());
        assert_eq!(*log.lock().unwrap(), vec!["p0g0", "p0g1", "p0g2"]);
        assert!(part.gaps().iter().all(|g| g.is_revealed()));
    }

    #[test]
    fn failing_gap_scores_zero_without_aborting() {
        let mut part = GapFillPart::new(
            "p0",
            vec![FixedPart::boxed("p0g0", 1.0, 1.0), Box::new(FailingPart)],
        );
        let result = part.mark().unwrap();
        assert!((result.credit - 0.5).abs() < 1e-12);
        assert!(!result.answered);
        assert_eq!(part.state(), GapFillState::PartiallyAnswered);
        assert!(result
            .feedback
            .iter()
            .any(|f| f.kind == FeedbackKind::Invalid && f.gap == Some(1)));
    }

    #[test]
    fn nested_composite_is_weighted_by_its_total_marks() {
        let inner = GapFillPart::new(
            "p0g1",
            vec![
                FixedPart::boxed("p0g1g0", 1.0, 1.0),
                FixedPart::boxed("p0g1g1", 1.0, 0.0),
            ],
        );
        let mut part = GapFillPart::new(
            "p0",
            vec![FixedPart::boxed("p0g0", 2.0, 1.0), Box::new(inner)],
        );
        assert!((part.marks() - 4.0).abs() < f64::EPSILON);

        let result = part.mark().unwrap();
        assert!((result.credit - 0.75).abs() < 1e-12);
        assert!(result.answered);

        // the outer index replaces the inner one
        let tagged: Vec<(&str, Option<usize>)> = result
            .feedback
            .iter()
            .map(|f| (f.message.as_str(), f.gap))
            .collect();
        assert_eq!(
            tagged,
            vec![
                ("Gap 1", Some(0)),
                ("p0g0 marked", Some(0)),
                ("Gap 2", Some(1)),
                ("Gap 1", Some(1)),
                ("p0g1g0 marked", Some(1)),
                ("Gap 2", Some(1)),
                ("p0g1g1 marked", Some(1)),
            ]
        );

        let inner_ids: Vec<&str> = part.gaps()[1].gaps().iter().map(|g| g.id()).collect();
        assert_eq!(inner_ids, vec!["p0g1g0", "p0g1g1"]);
    }

    #[test]
    fn unanswered_inner_gap_leaves_every_level_unanswered() {
        let inner = GapFillPart::new(
            "p0g1",
            vec![FixedPart::boxed("p0g1g0", 1.0, 1.0), Box::new(FailingPart)],
        );
        let mut part = GapFillPart::new(
            "p0",
            vec![FixedPart::boxed("p0g0", 2.0, 1.0), Box::new(inner)],
        );

        let result = part.mark().unwrap();
        assert!((result.credit - 0.75).abs() < 1e-12);
        assert!(!result.answered);
        assert!(part.gaps()[0].answered());
        assert!(!part.gaps()[1].answered());
        assert_eq!(part.state(), GapFillState::PartiallyAnswered);
    }

    #[test]
    fn staged_list_is_spread_over_gaps() {
        let mut part = GapFillPart::new(
            "p0",
            vec![
                FixedPart::boxed("p0g0", 1.0, 1.0),
                FixedPart::boxed("p0g1", 1.0, 1.0),
            ],
        );
        part.stage_answer(SymbolicAnswer::List(vec!["a".into(), "b".into()]));
        part.set_student_answer();
        assert_eq!(
            part.student_answer_as_symbolic(),
            SymbolicAnswer::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn resume_and_symbolic_answer_cover_every_gap() {
        let mut store = JsonAnswerStore::new();
        store.insert("p0g0", "x");
        store.insert("p0g1", "2y");
        let mut part = GapFillPart::new(
            "p0",
            vec![
                FixedPart::boxed("p0g0", 1.0, 1.0),
                FixedPart::boxed("p0g1", 1.0, 1.0),
            ],
        );
        assert_eq!(part.state(), GapFillState::Unanswered);

        part.resume(&store);
        part.set_student_answer();
        assert_eq!(
            part.student_answer_as_symbolic(),
            SymbolicAnswer::List(vec![
                SymbolicAnswer::Text("x".into()),
                SymbolicAnswer::Text("2y".into()),
            ])
        );
    }
}
