//! The `jmemark validate` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use jmemark_core::config::MarkingConfig;
use jmemark_core::parser::{load_question_directory, parse_question, validate_question};
use jmemark_core::Question;
use jmemark_jme::JmeEngine;

pub fn execute(question_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = MarkingConfig::load_or_default(config_path.as_deref())?;
    let questions = if question_path.is_dir() {
        load_question_directory(&question_path, &config)?
    } else {
        vec![parse_question(&question_path, &config)?]
    };

    let engine = Arc::new(JmeEngine::new());
    let mut total_warnings = 0;
    let mut total_errors = 0;

    for def in &questions {
        println!("Question: {} ({} parts)", def.name, def.parts.len());

        let warnings = validate_question(def);
        for w in &warnings {
            let prefix = w
                .part_path
                .as_ref()
                .map(|path| format!("  [{path}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();

        // Building catches references that don't parse or never evaluate.
        let seed = def.seed.or(config.seed).unwrap_or(0);
        if let Err(e) = Question::build_with_seed(def, Arc::clone(&engine), seed) {
            println!("   ERROR: {e}");
            total_errors += 1;
        }
    }

    if total_warnings == 0 && total_errors == 0 {
        println!("All questions valid.");
    } else {
        println!("\n{total_warnings} warning(s), {total_errors} error(s) found.");
    }

    anyhow::ensure!(total_errors == 0, "{total_errors} question(s) failed to build");
    Ok(())
}
