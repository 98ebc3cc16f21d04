//! End-to-end marking tests with the real JME engine.
//!
//! These run the whole pipeline: TOML question → question instance → staged
//! answers → marking report.

use std::path::Path;
use std::sync::Arc;

use jmemark_core::checker::AnswerChecker;
use jmemark_core::config::MarkingConfig;
use jmemark_core::model::{
    CheckingConfig, CheckingType, FeedbackKind, SampleDistribution, SymbolicAnswer,
};
use jmemark_core::parser::{load_question_directory, parse_question_str};
use jmemark_core::scope::VariableScope;
use jmemark_core::traits::Evaluator;
use jmemark_core::Question;
use jmemark_jme::JmeEngine;

const QUADRATICS: &str = r#"
[question]
id = "quadratics"
name = "Quadratics"
seed = 42

[[variables]]
name = "a"
definition = "3"

[[variables]]
name = "b"
definition = "a + 2"

[[parts]]
type = "jme"
marks = 2
answer = "{a}x^2 + {b}x"

[[parts]]
type = "gapfill"

[[parts.gaps]]
type = "jme"
marks = 1
answer = "2x"

[[parts.gaps]]
type = "jme"
marks = 3
answer = "x^2"
must_have = { strings = ["^"], partial_credit = 0.5 }

[[parts]]
type = "jme"
marks = 1
answer = "x^2"
min_length = { length = 20, partial_credit = 0.8 }
not_allowed = { strings = ["*"], partial_credit = 0.5 }
"#;

fn build(content: &str) -> Question {
    let config = MarkingConfig::default();
    let def = parse_question_str(content, Path::new("quadratics.toml"), &config).unwrap();
    Question::build(&def, Arc::new(JmeEngine::new()), &config).unwrap()
}

fn checking(checking_type: CheckingType, accuracy: f64) -> CheckingConfig {
    CheckingConfig {
        checking_type,
        accuracy,
        ..CheckingConfig::default()
    }
}

#[test]
fn variables_flow_into_the_reference() {
    let mut question = build(QUADRATICS);
    assert_eq!(question.seed(), 42);
    assert_eq!(question.total_marks(), 7.0);

    question.stage_answer("p0", "x(3x+5)".into());
    let report = question.mark_all();
    let p0 = report.part("p0").unwrap();
    assert_eq!(p0.result.credit, 1.0);
    assert!(p0.result.answered);
}

#[test]
fn wrong_answer_scores_nothing() {
    let mut question = build(QUADRATICS);
    question.stage_answer("p0", "3x^2 + 5".into());
    let report = question.mark_all();
    assert_eq!(report.part("p0").unwrap().result.credit, 0.0);
}

#[test]
fn gap_fill_weights_gaps_by_marks() {
    let mut question = build(QUADRATICS);
    question.stage_answer("p1", SymbolicAnswer::List(vec!["x + x".into(), "x*x".into()]));
    let report = question.mark_all();

    let p1 = &report.part("p1").unwrap().result;
    assert!((p1.credit - 0.625).abs() < 1e-12);
    assert_eq!(p1.marks, 4.0);
    assert!(p1.answered);
    let headers: Vec<&str> = p1
        .feedback
        .iter()
        .filter(|f| f.kind == FeedbackKind::Header)
        .map(|f| f.message.as_str())
        .collect();
    assert_eq!(headers, ["Gap 1", "Gap 2"]);
}

#[test]
fn soft_penalties_multiply() {
    let mut question = build(QUADRATICS);
    question.stage_answer("p2", "x*x".into());
    let report = question.mark_all();

    let p2 = &report.part("p2").unwrap().result;
    assert!((p2.credit - 0.4).abs() < 1e-12);
    let multipliers = p2
        .feedback
        .iter()
        .filter(|f| f.kind == FeedbackKind::MultiplyCredit)
        .count();
    assert_eq!(multipliers, 2);
}

#[test]
fn unanswered_parts_score_nothing() {
    let mut question = build(QUADRATICS);
    let report = question.mark_all();
    assert_eq!(report.total_score, 0.0);
    assert!(report.parts.iter().all(|p| !p.result.answered));
}

#[test]
fn revealed_answers_are_marked_like_any_other() {
    let mut question = build(QUADRATICS);
    question.reveal_all();
    let report = question.mark_all();

    assert_eq!(report.part("p0").unwrap().result.credit, 1.0);
    assert_eq!(report.part("p1").unwrap().result.credit, 1.0);
    // `x^2` is still shorter than the part's minimum length.
    assert!((report.part("p2").unwrap().result.credit - 0.8).abs() < 1e-12);
    assert!(report.parts.iter().all(|p| p.revealed));
}

#[test]
fn deeply_nested_answers_are_invalid_not_fatal() {
    let mut question = build(QUADRATICS);
    for depth in [1_000, 8_000] {
        let nested = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        question.stage_answer("p0", nested.into());
        question.stage_answer("p2", "x*x".into());
        let report = question.mark_all();

        let p0 = &report.part("p0").unwrap().result;
        assert!(p0.answered);
        assert_eq!(p0.credit, 0.0);
        assert_eq!(p0.feedback[0].kind, FeedbackKind::Invalid);
        assert!(p0.feedback[0].message.contains("too deeply nested"), "{}", p0.feedback[0].message);

        // the rest of the question is still marked
        assert!((report.part("p2").unwrap().result.credit - 0.4).abs() < 1e-12);
    }

    let chain = vec!["x"; 5_000].join("+");
    question.stage_answer("p0", chain.into());
    let report = question.mark_all();
    assert_eq!(
        report.part("p0").unwrap().result.feedback[0].kind,
        FeedbackKind::Invalid
    );
}

#[test]
fn answers_resume_into_a_fresh_instance() {
    let mut first = build(QUADRATICS);
    first.stage_answer("p0", "3x^2+5x".into());
    first.stage_answer("p1", SymbolicAnswer::List(vec!["2x".into(), "x^2".into()]));
    let marked = first.mark_all();

    let mut second = build(QUADRATICS);
    second.stage_answers(&first.answers());
    let resumed = second.mark_all();

    assert_eq!(resumed.total_score, marked.total_score);
    assert_eq!(resumed.total_score, 6.0);
}

#[test]
fn symbolic_answers_round_trip_through_the_parser() {
    let engine = JmeEngine::new();
    let mut question = build(QUADRATICS);
    question.stage_answer("p0", "x (3x + 5)".into());
    let report = question.mark_all();

    let SymbolicAnswer::Text(text) = &report.part("p0").unwrap().student_answer else {
        panic!("expected a text answer");
    };
    assert_eq!(engine.parse(text).unwrap(), engine.parse("x*(3*x+5)").unwrap());
}

#[test]
fn checking_is_symmetric_for_every_checking_type() {
    let engine = JmeEngine::new();
    let scope = VariableScope::new();
    let pairs = [
        ("x^2", "x*x"),
        ("x^2", "x^2 + 0.00001"),
        ("sin(x)^2 + cos(x)^2", "1"),
        ("x", "x + 1"),
    ];
    let configs = [
        checking(CheckingType::RelDiff, 0.0001),
        checking(CheckingType::AbsDiff, 0.001),
        checking(CheckingType::DecimalPlaces, 3.0),
        checking(CheckingType::SigFig, 4.0),
        checking(CheckingType::Exact, 0.0),
    ];
    for seed in [1, 7, 1234] {
        let checker = AnswerChecker::new(&engine, seed);
        for (a, b) in pairs {
            let (a, b) = (engine.parse(a).unwrap(), engine.parse(b).unwrap());
            for config in &configs {
                assert_eq!(
                    checker.check_equivalent(&a, &b, config, &scope),
                    checker.check_equivalent(&b, &a, config, &scope),
                    "{a} vs {b} with {}",
                    config.checking_type
                );
            }
        }
    }
}

#[test]
fn an_expression_is_equivalent_to_itself() {
    let engine = JmeEngine::new();
    let scope = VariableScope::new();
    let config = checking(CheckingType::Exact, 0.0);
    for text in ["x^2 + 3x - 1", "e^x * ln(x + 1)", "sqrt(x) / (1 + y)"] {
        let expr = engine.parse(text).unwrap();
        for seed in 0..20 {
            let outcome =
                AnswerChecker::new(&engine, seed).check_equivalent(&expr, &expr, &config, &scope);
            assert!(outcome.equivalent, "{text} with seed {seed}");
            assert_eq!(outcome.failures, 0);
        }
    }
}

#[test]
fn implicit_and_explicit_forms_agree() {
    let engine = JmeEngine::new();
    let checker = AnswerChecker::new(&engine, 99);
    let scope = VariableScope::new();
    let config = CheckingConfig::default();

    let two_x = engine.parse("2x").unwrap();
    let x_plus_x = engine.parse("x + x").unwrap();
    let x_squared = engine.parse("x^2").unwrap();
    assert!(checker.check_equivalent(&two_x, &x_plus_x, &config, &scope).equivalent);
    assert!(!checker.check_equivalent(&two_x, &x_squared, &config, &scope).equivalent);
}

#[test]
fn a_larger_failure_budget_never_rejects_more() {
    let engine = JmeEngine::new();
    let scope = VariableScope::new();
    let candidate = engine.parse("x^2").unwrap();
    let reference = engine.parse("x").unwrap();

    for seed in 0..10 {
        let checker = AnswerChecker::new(&engine, seed);
        let mut was_equivalent = false;
        let mut failures = None;
        for max_failures in 0..=10 {
            let config = CheckingConfig {
                range_start: 0.0,
                range_end: 3.0,
                distribution: SampleDistribution::Integer,
                points: 10,
                max_failures,
                ..CheckingConfig::default()
            };
            let outcome = checker.check_equivalent(&candidate, &reference, &config, &scope);
            assert!(!was_equivalent || outcome.equivalent);
            assert_eq!(*failures.get_or_insert(outcome.failures), outcome.failures);
            was_equivalent = outcome.equivalent;
        }
        assert!(was_equivalent);
    }
}

#[test]
fn bad_reference_fails_construction() {
    let broken = QUADRATICS.replace("answer = \"2x\"", "answer = \"2x +\"");
    let config = MarkingConfig::default();
    let def = parse_question_str(&broken, Path::new("broken.toml"), &config).unwrap();
    let err = Question::build(&def, Arc::new(JmeEngine::new()), &config).unwrap_err();
    assert!(err.to_string().starts_with("part p1g0:"), "{err}");
}

#[test]
fn loads_a_directory_of_questions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.toml"), QUADRATICS).unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(
        dir.path().join("nested").join("a.toml"),
        QUADRATICS.replace("id = \"quadratics\"", "id = \"nested\""),
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a question").unwrap();
    std::fs::write(dir.path().join("broken.toml"), "[question\n").unwrap();

    let config = MarkingConfig::default();
    let defs = load_question_directory(dir.path(), &config).unwrap();
    let ids: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["quadratics", "nested"]);

    for def in &defs {
        Question::build(def, Arc::new(JmeEngine::new()), &config).unwrap();
    }
}
