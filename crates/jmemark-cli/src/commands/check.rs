//! The `jmemark check` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use jmemark_core::checker::AnswerChecker;
use jmemark_core::config::MarkingConfig;
use jmemark_core::model::CheckingType;
use jmemark_core::scope::VariableScope;
use jmemark_core::traits::Evaluator;
use jmemark_jme::JmeEngine;

pub struct CheckOptions {
    pub expected: String,
    pub answer: String,
    pub checking_type: Option<String>,
    pub accuracy: Option<f64>,
    pub points: Option<u32>,
    pub range: Option<Vec<f64>>,
    pub max_failures: Option<u32>,
    pub seed: u64,
    pub config: Option<PathBuf>,
}

pub fn execute(opts: CheckOptions) -> Result<()> {
    let config = MarkingConfig::load_or_default(opts.config.as_deref())?;
    let mut checking = config.checking();
    if let Some(t) = &opts.checking_type {
        checking.checking_type = t.parse::<CheckingType>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(accuracy) = opts.accuracy {
        checking.accuracy = accuracy;
    }
    if let Some(points) = opts.points {
        checking.points = points;
    }
    if let Some(max_failures) = opts.max_failures {
        checking.max_failures = max_failures;
    }
    if let Some(range) = &opts.range {
        anyhow::ensure!(range.len() == 2, "range must be START,END");
        checking.range_start = range[0];
        checking.range_end = range[1];
    }
    checking.validate()?;

    let engine = JmeEngine::new();
    let expected = engine
        .parse(&opts.expected)
        .with_context(|| format!("can't parse expected expression '{}'", opts.expected))?;
    let answer = engine
        .parse(&opts.answer)
        .with_context(|| format!("can't parse answer '{}'", opts.answer))?;

    let outcome = AnswerChecker::new(&engine, opts.seed).check_equivalent(
        &answer,
        &expected,
        &checking,
        &VariableScope::new(),
    );

    let verdict = if outcome.equivalent {
        "equivalent"
    } else {
        "not equivalent"
    };
    println!(
        "{verdict} ({} of {} trials failed, {} allowed)",
        outcome.failures, outcome.trials, checking.max_failures
    );

    if !outcome.equivalent {
        std::process::exit(1);
    }

    Ok(())
}
