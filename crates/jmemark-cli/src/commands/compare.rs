//! The `jmemark compare` command.

use std::path::PathBuf;

use anyhow::Result;

use jmemark_core::report::MarkingReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    format: String,
) -> Result<()> {
    let baseline = MarkingReport::load_json(&baseline_path)?;
    let current = MarkingReport::load_json(&current_path)?;
    anyhow::ensure!(
        baseline.question.id == current.question.id,
        "reports are for different questions: '{}' and '{}'",
        baseline.question.id,
        current.question.id
    );

    let changes = current.compare(&baseline, threshold);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&changes)?),
        "markdown" | "md" => {
            println!("| Part | Baseline | Current | Change |");
            println!("|------|----------|---------|--------|");
            for c in &changes {
                println!(
                    "| {} | {:.2} | {:.2} | {:+.2} |",
                    c.part_id, c.baseline_score, c.current_score, c.delta
                );
            }
        }
        _ => {
            println!(
                "Total: {:.2} -> {:.2} ({} part(s) changed)",
                baseline.total_score,
                current.total_score,
                changes.len()
            );
            for c in &changes {
                println!(
                    "  {} {:.2} -> {:.2} ({:+.2})",
                    c.part_id, c.baseline_score, c.current_score, c.delta
                );
            }
        }
    }

    Ok(())
}
