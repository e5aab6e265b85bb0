mod commands;

use anyhow::{Context, Result};
use arbiter_common::config::Settings;
use arbiter_common::types::Language;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "arbiter-cli")]
#[command(about = "Arbiter CLI - Run, grade and inspect submissions locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to find the problem to grade against
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ProblemSource {
    /// Single problem JSON file
    #[arg(short, long)]
    problem: Option<PathBuf>,

    /// Problem catalog JSON file (`{"problems": [...]}`), used with --id
    #[arg(short, long, requires = "id")]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a source file and print the execution result as JSON
    Run {
        /// Language name (javascript, python, java, cpp)
        #[arg(short, long)]
        language: Language,

        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// File whose contents are fed to stdin
        #[arg(short, long)]
        input_file: Option<PathBuf>,
    },

    /// Grade a source file against every example of a problem
    Submit {
        #[command(flatten)]
        source: ProblemSource,

        /// Problem id inside the catalog
        #[arg(long)]
        id: Option<String>,

        /// Language name (javascript, python, java, cpp)
        #[arg(short, long)]
        language: Language,

        /// Source file holding the solution
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the harness program generated for one example
    Harness {
        #[command(flatten)]
        source: ProblemSource,

        /// Problem id inside the catalog
        #[arg(long)]
        id: Option<String>,

        /// 1-based example number
        #[arg(short, long, default_value = "1")]
        example: usize,

        /// Language name (javascript, python, java, cpp)
        #[arg(short, long)]
        language: Language,

        /// Source file holding the solution
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List configured toolchains
    Languages,
}

fn init_tracing() {
    // stdout carries JSON results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel in-flight work on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling...");
            token.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::from_env().context("Invalid ARBITER_* configuration")?;

    match cli.command {
        Commands::Run {
            language,
            file,
            input_file,
        } => {
            let cancel = cancel_on_ctrl_c();
            let result =
                commands::run_file(&settings, language, &file, input_file.as_deref(), &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Submit {
            source,
            id,
            language,
            file,
        } => {
            let problem =
                commands::load_problem(source.problem.as_deref(), source.catalog.as_deref(), id.as_deref())?;
            let cancel = cancel_on_ctrl_c();
            let summary = commands::submit_file(&settings, &problem, language, &file, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.all_passed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Harness {
            source,
            id,
            example,
            language,
            file,
        } => {
            let problem =
                commands::load_problem(source.problem.as_deref(), source.catalog.as_deref(), id.as_deref())?;
            print!("{}", commands::render_harness(&problem, example, language, &file)?);
        }
        Commands::Languages => {
            for line in commands::describe_languages(&settings)? {
                println!("{}", line);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
