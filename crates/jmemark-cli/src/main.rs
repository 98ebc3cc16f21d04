//! jmemark CLI — mark student answers against question definitions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "jmemark",
    version,
    about = "Automated marking of mathematical-expression answers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark answers to a question
    Mark {
        /// Path to a .toml question file
        #[arg(long)]
        question: PathBuf,

        /// JSON file of saved answers keyed by part id
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Answer for one part, as ID=EXPR (repeatable, overrides --answers)
        #[arg(long = "answer", value_name = "ID=EXPR")]
        answer: Vec<String>,

        /// Seed for question variables and checking trials
        #[arg(long)]
        seed: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Mark the correct answers instead of the student's
        #[arg(long)]
        reveal: bool,

        /// Write the JSON report here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check whether two expressions are numerically equivalent
    Check {
        /// The reference expression
        #[arg(long)]
        expected: String,

        /// The expression to check
        #[arg(long)]
        answer: String,

        /// Checking type: reldiff, absdiff, dp, sigfig, exact
        #[arg(long)]
        checking_type: Option<String>,

        /// Checking accuracy
        #[arg(long)]
        accuracy: Option<f64>,

        /// Number of trials
        #[arg(long)]
        points: Option<u32>,

        /// Sampling range as START,END
        #[arg(long, value_delimiter = ',')]
        range: Option<Vec<f64>>,

        /// Failed trials tolerated
        #[arg(long)]
        max_failures: Option<u32>,

        /// Sampling seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate question TOML files
    Validate {
        /// Path to a question file or directory
        #[arg(long)]
        question: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two marking reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Smallest score change reported
        #[arg(long, default_value = "0.0")]
        threshold: f64,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example question
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jmemark=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Mark {
            question,
            answers,
            answer,
            seed,
            config,
            reveal,
            output,
            format,
        } => commands::mark::execute(commands::mark::MarkOptions {
            question,
            answers,
            overrides: answer,
            seed,
            config,
            reveal,
            output,
            format,
        }),
        Commands::Check {
            expected,
            answer,
            checking_type,
            accuracy,
            points,
            range,
            max_failures,
            seed,
            config,
        } => commands::check::execute(commands::check::CheckOptions {
            expected,
            answer,
            checking_type,
            accuracy,
            points,
            range,
            max_failures,
            seed,
            config,
        }),
        Commands::Validate { question, config } => commands::validate::execute(question, config),
        Commands::Compare {
            baseline,
            current,
            threshold,
            format,
        } => commands::compare::execute(baseline, current, threshold, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
