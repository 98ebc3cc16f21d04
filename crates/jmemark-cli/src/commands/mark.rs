//! The `jmemark mark` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use jmemark_core::config::MarkingConfig;
use jmemark_core::model::{FeedbackKind, SymbolicAnswer};
use jmemark_core::parser::parse_question;
use jmemark_core::report::MarkingReport;
use jmemark_core::store::{AnswerStore, JsonAnswerStore};
use jmemark_core::Question;
use jmemark_jme::JmeEngine;

pub struct MarkOptions {
    pub question: PathBuf,
    pub answers: Option<PathBuf>,
    /// `ID=EXPR` pairs from the command line.
    pub overrides: Vec<String>,
    pub seed: Option<u64>,
    pub config: Option<PathBuf>,
    pub reveal: bool,
    pub output: Option<PathBuf>,
    pub format: String,
}

pub fn execute(opts: MarkOptions) -> Result<()> {
    let config = MarkingConfig::load_or_default(opts.config.as_deref())?;
    let def = parse_question(&opts.question, &config)?;

    let engine = Arc::new(JmeEngine::new());
    let mut question = match opts.seed {
        Some(seed) => Question::build_with_seed(&def, engine, seed),
        None => Question::build(&def, engine, &config),
    }
    .with_context(|| format!("failed to build question `{}`", def.id))?;

    let store = answer_store(opts.answers.as_ref(), &opts.overrides)?;
    let known = question.answers();
    for (part_id, _) in store.iter() {
        if known.load(part_id).is_none() {
            tracing::warn!("question `{}` has no part `{part_id}`", def.id);
        }
    }
    question.stage_answers(&store);

    if opts.reveal {
        question.reveal_all();
    }

    let report = question.mark_all();

    match opts.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "markdown" | "md" => println!("{}", report.to_markdown()),
        _ => print_report(&report),
    }

    if let Some(path) = &opts.output {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

/// Saved answers overlaid with `ID=EXPR` overrides.
fn answer_store(path: Option<&PathBuf>, overrides: &[String]) -> Result<JsonAnswerStore> {
    let mut store = match path {
        Some(path) => JsonAnswerStore::load_file(path)?,
        None => JsonAnswerStore::new(),
    };
    for pair in overrides {
        let (id, expr) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid answer '{pair}', expected ID=EXPR"))?;
        anyhow::ensure!(!id.trim().is_empty(), "invalid answer '{pair}', missing part id");
        store.insert(id.trim(), expr.trim());
    }
    Ok(store)
}

fn print_report(report: &MarkingReport) {
    println!("{} ({}) seed {}", report.question.name, report.question.id, report.seed);

    let mut table = Table::new();
    table.set_header(vec!["Part", "Answer", "Credit", "Score"]);
    for part in &report.parts {
        table.add_row(vec![
            Cell::new(&part.part_id),
            Cell::new(answer_text(&part.student_answer)),
            Cell::new(format!("{:.1}%", part.result.credit * 100.0)),
            Cell::new(format!("{:.2} / {:.2}", part.result.score(), part.result.marks)),
        ]);
    }
    println!("{table}");

    for part in &report.parts {
        let lines: Vec<String> = part
            .result
            .feedback
            .iter()
            .filter(|f| f.kind != FeedbackKind::Header && !f.message.is_empty())
            .map(|f| match f.gap {
                Some(gap) => format!("  [{}] gap {}: {}", part.part_id, gap + 1, f.message),
                None => format!("  [{}] {}", part.part_id, f.message),
            })
            .collect();
        for line in lines {
            println!("{line}");
        }
    }

    println!(
        "Total: {:.2} / {:.2}",
        report.total_score, report.total_marks
    );
}

fn answer_text(answer: &SymbolicAnswer) -> String {
    match answer {
        SymbolicAnswer::Text(text) if text.is_empty() => "-".to_string(),
        SymbolicAnswer::Text(text) => text.clone(),
        SymbolicAnswer::List(items) => items
            .iter()
            .map(answer_text)
            .collect::<Vec<_>>()
            .join(", "),
    }
}
