//! A question instance: evaluated variables plus constructed parts.

use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::MarkingConfig;
use crate::error::ConfigurationError;
use crate::model::{Feedback, PartDef, PartResult, QuestionDef, SymbolicAnswer};
use crate::part::{gap_path, part_path, ExpressionPart, GapFillPart, Markable};
use crate::report::{MarkingReport, PartReport, QuestionSummary};
use crate::scope::VariableScope;
use crate::store::{AnswerStore, JsonAnswerStore};
use crate::traits::ExpressionEngine;

/// A question with its variables fixed and its parts ready to mark.
pub struct Question {
    id: String,
    name: String,
    seed: u64,
    scope: Arc<VariableScope>,
    parts: Vec<Box<dyn Markable>>,
}

impl std::fmt::Debug for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Question")
            .field("id", &self.id)
            .field("seed", &self.seed)
            .field("scope", &self.scope)
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl Question {
    /// Build a question, taking its seed from the definition, then the
    /// config, then fresh randomness.
    pub fn build<E: ExpressionEngine + 'static>(
        def: &QuestionDef,
        engine: Arc<E>,
        config: &MarkingConfig,
    ) -> Result<Self, ConfigurationError> {
        let seed = def
            .seed
            .or(config.seed)
            .unwrap_or_else(rand::random::<u64>);
        Self::build_with_seed(def, engine, seed)
    }

    /// Build a question from an explicit seed.
    pub fn build_with_seed<E: ExpressionEngine + 'static>(
        def: &QuestionDef,
        engine: Arc<E>,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        let scope = Arc::new(evaluate_variables(def, engine.as_ref())?);
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        let parts = def
            .parts
            .iter()
            .enumerate()
            .map(|(i, part)| build_part(part, part_path(i), &scope, &engine, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            question = %def.id,
            seed,
            variables = scope.len(),
            parts = parts.len(),
            "built question"
        );

        Ok(Self {
            id: def.id.clone(),
            name: def.name.clone(),
            seed,
            scope,
            parts,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scope(&self) -> &VariableScope {
        &self.scope
    }

    pub fn parts(&self) -> &[Box<dyn Markable>] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Box<dyn Markable>] {
        &mut self.parts
    }

    pub fn total_marks(&self) -> f64 {
        self.parts.iter().map(|p| p.marks()).sum()
    }

    /// Stage the answer of the top-level part `part_id`.
    ///
    /// Returns `false` when there is no such part.
    pub fn stage_answer(&mut self, part_id: &str, answer: SymbolicAnswer) -> bool {
        match self.parts.iter_mut().find(|p| p.id() == part_id) {
            Some(part) => {
                part.stage_answer(answer);
                true
            }
            None => false,
        }
    }

    /// Pre-populate every part's staged answer from saved state.
    pub fn stage_answers(&mut self, store: &dyn AnswerStore) {
        for part in &mut self.parts {
            part.resume(store);
        }
    }

    pub fn reveal_all(&mut self) {
        for part in &mut self.parts {
            part.reveal_answer();
        }
    }

    /// Mark every part in order.
    ///
    /// A part that can't be marked scores 0 with an `Invalid` feedback item;
    /// the remaining parts are still marked.
    pub fn mark_all(&mut self) -> MarkingReport {
        let mut reports = Vec::with_capacity(self.parts.len());
        for part in &mut self.parts {
            let result = part.mark().unwrap_or_else(|e| {
                tracing::warn!(part = %part.id(), error = %e, "part could not be marked");
                let mut r = PartResult::new(part.marks());
                r.feedback.push(Feedback::invalid(e.to_string()));
                r
            });
            reports.push(PartReport {
                part_id: part.id().to_string(),
                result,
                student_answer: part.student_answer_as_symbolic(),
                revealed: part.is_revealed(),
            });
        }

        let report = MarkingReport::new(
            QuestionSummary {
                id: self.id.clone(),
                name: self.name.clone(),
                part_count: self.parts.len(),
            },
            self.seed,
            reports,
        );
        tracing::info!(
            question = %self.id,
            score = report.total_score,
            marks = report.total_marks,
            "marked question"
        );
        report
    }

    /// The submitted answer of every single-answer part, keyed by id.
    pub fn answers(&self) -> JsonAnswerStore {
        let mut store = JsonAnswerStore::new();
        for part in &self.parts {
            collect_answers(part.as_ref(), &mut store);
        }
        store
    }
}

fn collect_answers(part: &dyn Markable, store: &mut JsonAnswerStore) {
    if part.gaps().is_empty() {
        if let SymbolicAnswer::Text(text) = part.student_answer_as_symbolic() {
            store.insert(part.id(), text);
        }
    } else {
        for gap in part.gaps() {
            collect_answers(gap.as_ref(), store);
        }
    }
}

/// Evaluate variable definitions in order; each may use the ones before it.
fn evaluate_variables<E: ExpressionEngine>(
    def: &QuestionDef,
    engine: &E,
) -> Result<VariableScope, ConfigurationError> {
    let mut scope = VariableScope::new();
    for var in &def.variables {
        let failed = |reason: String| ConfigurationError::Variable {
            name: var.name.clone(),
            reason,
        };
        let expr = engine
            .parse(&var.definition)
            .map_err(|e| failed(e.to_string()))?;
        let value = engine
            .evaluate(&expr, &scope)
            .map_err(|e| failed(e.to_string()))?;
        if !value.is_finite() {
            return Err(failed("the value is not finite".into()));
        }
        tracing::trace!(name = %var.name, value = %value, "evaluated variable");
        scope = scope.with(&var.name, value);
    }
    Ok(scope)
}

fn build_part<E: ExpressionEngine + 'static>(
    def: &PartDef,
    path: String,
    scope: &Arc<VariableScope>,
    engine: &Arc<E>,
    rng: &mut ChaCha20Rng,
) -> Result<Box<dyn Markable>, ConfigurationError> {
    match def {
        PartDef::Jme(settings) => {
            let part = ExpressionPart::new(
                path,
                settings.clone(),
                Arc::clone(scope),
                Arc::clone(engine),
                rng.next_u64(),
            )?;
            Ok(Box::new(part))
        }
        PartDef::GapFill { gaps } => {
            let children = gaps
                .iter()
                .enumerate()
                .map(|(i, gap)| build_part(gap, gap_path(&path, i), scope, engine, rng))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Box::new(GapFillPart::new(path, children)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::mock::MockEvaluator;
    use crate::model::{CheckingConfig, ExpressionPartSettings, ValidationPolicy, VariableDef};

    fn engine() -> Arc<MockEvaluator> {
        Arc::new(
            MockEvaluator::new()
                .with_constant("3", 3.0)
                .with("a+1", &["a"], |b| Ok(b.num("a")? + 1.0))
                .with("1/0", &[], |_| Err(EvalError::DivisionByZero))
                .with("3x", &["x"], |b| Ok(3.0 * b.num("x")?))
                .with("4x", &["x"], |b| Ok(4.0 * b.num("x")?))
                .with("x+x+x", &["x"], |b| Ok(3.0 * b.num("x")?))
                .with("x", &["x"], |b| b.num("x")),
        )
    }

    fn jme(answer: &str, marks: f64) -> PartDef {
        PartDef::Jme(ExpressionPartSettings {
            marks,
            answer: answer.into(),
            simplification: String::new(),
            checking: CheckingConfig::default(),
            validation: ValidationPolicy::default(),
        })
    }

    fn def() -> QuestionDef {
        QuestionDef {
            id: "q1".into(),
            name: "Linear".into(),
            description: String::new(),
            variables: vec![
                VariableDef {
                    name: "a".into(),
                    definition: "3".into(),
                },
                VariableDef {
                    name: "b".into(),
                    definition: "a + 1".into(),
                },
            ],
            parts: vec![
                jme("{a}x", 2.0),
                PartDef::GapFill {
                    gaps: vec![jme("x", 1.0), jme("{b}x", 1.0)],
                },
            ],
            seed: Some(11),
        }
    }

    #[test]
    fn variables_evaluate_in_order() {
        let q = Question::build(&def(), engine(), &MarkingConfig::default()).unwrap();
        let values: Vec<(&str, String)> = q.scope().iter().map(|(k, v)| (k, v.to_string())).collect();
        assert_eq!(values, vec![("a", "3".to_string()), ("b", "4".to_string())]);
        assert_eq!(q.seed(), 11);
    }

    #[test]
    fn failing_variable_is_a_configuration_error() {
        let mut d = def();
        d.variables.push(VariableDef {
            name: "c".into(),
            definition: "1/0".into(),
        });
        let err = Question::build(&d, engine(), &MarkingConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Variable { ref name, .. } if name == "c"));
    }

    #[test]
    fn part_ids_follow_paths() {
        let q = Question::build(&def(), engine(), &MarkingConfig::default()).unwrap();
        let ids: Vec<&str> = q.parts().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["p0", "p1"]);
        let gap_ids: Vec<&str> = q.parts()[1].gaps().iter().map(|g| g.id()).collect();
        assert_eq!(gap_ids, vec!["p1g0", "p1g1"]);
        assert!((q.total_marks() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn construction_error_carries_gap_path() {
        let mut d = def();
        d.parts[1] = PartDef::GapFill {
            gaps: vec![jme("x", 1.0), jme("", 1.0)],
        };
        let err = Question::build(&d, engine(), &MarkingConfig::default()).unwrap_err();
        assert!(err.to_string().starts_with("part p1g1:"));
    }

    #[test]
    fn seed_comes_from_config_when_question_has_none() {
        let mut d = def();
        d.seed = None;
        let config = MarkingConfig {
            seed: Some(99),
            ..Default::default()
        };
        assert_eq!(Question::build(&d, engine(), &config).unwrap().seed(), 99);
    }

    #[test]
    fn mark_all_uses_staged_answers() {
        let mut q = Question::build(&def(), engine(), &MarkingConfig::default()).unwrap();
        let mut store = JsonAnswerStore::new();
        store.insert("p0", "x + x + x");
        store.insert("p1g0", "x");
        store.insert("p1g1", "3x");
        q.stage_answers(&store);

        let report = q.mark_all();
        assert_eq!(report.parts.len(), 2);
        assert!((report.parts[0].result.credit - 1.0).abs() < f64::EPSILON);
        assert!((report.parts[1].result.credit - 0.5).abs() < f64::EPSILON);
        assert!((report.total_score - 3.0).abs() < f64::EPSILON);
        assert!((report.total_marks - 4.0).abs() < f64::EPSILON);
        assert_eq!(report.seed, 11);

        let answers = q.answers();
        assert_eq!(answers.len(), 3);
        assert_eq!(answers.load("p1g1").unwrap().student_answer, "3x");
    }

    #[test]
    fn stage_answer_targets_top_level_part() {
        let mut q = Question::build(&def(), engine(), &MarkingConfig::default()).unwrap();
        assert!(q.stage_answer("p0", "3x".into()));
        assert!(q.stage_answer(
            "p1",
            SymbolicAnswer::List(vec!["x".into(), "4x".into()])
        ));
        assert!(!q.stage_answer("p7", "x".into()));

        let report = q.mark_all();
        assert!((report.fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nested_gap_fill_marks_and_resumes_recursively() {
        let mut d = def();
        d.parts[1] = PartDef::GapFill {
            gaps: vec![
                jme("{a}x", 2.0),
                PartDef::GapFill {
                    gaps: vec![jme("x", 1.0), jme("{b}x", 1.0)],
                },
            ],
        };
        let mut q = Question::build(&d, engine(), &MarkingConfig::default()).unwrap();
        assert!((q.total_marks() - 6.0).abs() < f64::EPSILON);

        let inner = &q.parts()[1].gaps()[1];
        assert_eq!(inner.id(), "p1g1");
        let ids: Vec<&str> = inner.gaps().iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["p1g1g0", "p1g1g1"]);

        assert!(q.stage_answer(
            "p1",
            SymbolicAnswer::List(vec![
                "x + x + x".into(),
                SymbolicAnswer::List(vec!["x".into(), "3x".into()]),
            ])
        ));
        let report = q.mark_all();
        let p1 = &report.parts[1].result;
        assert!((p1.credit - 0.75).abs() < 1e-12);
        assert!(p1.answered);

        let answers = q.answers();
        let saved = |id: &str| answers.load(id).map(|a| a.student_answer);
        assert_eq!(saved("p1g0").as_deref(), Some("x + x + x"));
        assert_eq!(saved("p1g1g0").as_deref(), Some("x"));
        assert_eq!(saved("p1g1g1").as_deref(), Some("3x"));
        assert_eq!(saved("p1g1"), None);

        let mut resumed = Question::build(&d, engine(), &MarkingConfig::default()).unwrap();
        resumed.stage_answers(&answers);
        let again = resumed.mark_all();
        assert!((again.parts[1].result.credit - 0.75).abs() < 1e-12);
    }

    #[test]
    fn reveal_all_stages_correct_answers() {
        let mut q = Question::build(&def(), engine(), &MarkingConfig::default()).unwrap();
        q.reveal_all();
        let report = q.mark_all();
        assert!(report.parts.iter().all(|p| p.revealed));
        assert!((report.total_score - report.total_marks).abs() < f64::EPSILON);
    }

    #[test]
    fn same_seed_builds_same_instance() {
        let a = Question::build_with_seed(&def(), engine(), 5).unwrap();
        let b = Question::build_with_seed(&def(), engine(), 5).unwrap();
        assert_eq!(a.scope(), b.scope());
        assert_eq!(a.seed(), b.seed());
    }
}
