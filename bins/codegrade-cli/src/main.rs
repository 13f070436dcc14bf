mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codegrade-cli")]
#[command(about = "Codegrade CLI - Evaluate Python submissions locally or through the queue", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a submission against a problem and print the report
    Evaluate {
        /// Problem definition (JSON)
        #[arg(short, long)]
        problem: PathBuf,

        /// Submission source file
        #[arg(short, long)]
        code: PathBuf,

        /// Runtime config (defaults to config/runtime.json when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Redact hidden test case details
        #[arg(long, default_value = "false")]
        public: bool,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run only the static analyzers (complexity, style, security)
    Analyze {
        /// Submission source file
        #[arg(short, long)]
        code: PathBuf,
    },

    /// Queue a submission for a worker
    Submit {
        /// Problem definition (JSON)
        #[arg(short, long)]
        problem: PathBuf,

        /// Submission source file
        #[arg(short, long)]
        code: PathBuf,
    },

    /// Fetch the result of a queued submission
    Result {
        /// Job id printed by `submit`
        #[arg(short, long)]
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so reports on stdout stay parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            problem,
            code,
            config,
            public,
            output,
        } => {
            commands::evaluate(&problem, &code, config.as_deref(), public, output.as_deref())
                .await?;
        }
        Commands::Analyze { code } => {
            commands::analyze(&code)?;
        }
        Commands::Submit { problem, code } => {
            commands::submit(&problem, &code).await?;
        }
        Commands::Result { job_id } => {
            commands::fetch_result(&job_id).await?;
        }
    }

    Ok(())
}
