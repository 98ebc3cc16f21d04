//! The `jmemark init` command.

use std::path::Path;

use anyhow::Result;

use jmemark_core::config::{MarkingConfig, CONFIG_FILE_NAME};

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        let config = MarkingConfig::default().to_toml_string()?;
        std::fs::write(CONFIG_FILE_NAME, format!("{CONFIG_HEADER}{config}"))?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    std::fs::create_dir_all("questions")?;
    let example_path = Path::new("questions/example.toml");
    if example_path.exists() {
        println!("questions/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION)?;
        println!("Created questions/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: jmemark validate --question questions/example.toml");
    println!("  2. Run: jmemark mark --question questions/example.toml --answer p0=\"x^2+5x\"");

    Ok(())
}

const CONFIG_HEADER: &str = "# jmemark configuration: defaults for parts that don't set their own.\n\n";

const EXAMPLE_QUESTION: &str = r#"[question]
id = "example"
name = "Expanding brackets"
description = "A starter question with a single-answer part and a gap-fill."

[[variables]]
name = "a"
definition = "2"

[[variables]]
name = "b"
definition = "a + 3"

[[parts]]
type = "jme"
marks = 2
answer = "x^2 + {b}x"
not_allowed = { strings = ["("], partial_credit = 0.5, message = "Expand the brackets." }

[[parts]]
type = "gapfill"

[[parts.gaps]]
type = "jme"
marks = 1
answer = "{a}x"
check_variable_names = true
expected_variable_names = ["x"]

[[parts.gaps]]
type = "jme"
marks = 1
answer = "sin(2x)"
checking = { type = "absdiff", accuracy = 0.001, range = [-3.0, 3.0] }
"#;
