//! Grounded CLI
//!
//! Main entry point for the grounded command-line tool.
//! Answers questions from a tenant-scoped passage store with cited evidence.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, DoctorCommand, ImportCommand};
use grounded_core::{config::AppConfig, logging, AppError, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// Grounded - question answering with per-sentence citations
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Question answering over your documents with cited evidence", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GROUNDED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Passage store path (default: <workspace>/.grounded/passages.sqlite)
    #[arg(long, global = true, env = "GROUNDED_DATABASE")]
    database: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation provider (ollama)
    #[arg(short, long, global = true, env = "GROUNDED_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "GROUNDED_MODEL")]
    model: Option<String>,

    /// Deterministic offline mode: no generation calls, hashing embeddings
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question and get a cited answer
    Ask(AskCommand),

    /// Import passages from a JSONL file
    Import(ImportCommand),

    /// Check the passage store and collaborators
    Doctor(DoctorCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {}", e.code(), e);
            match e {
                AppError::Input { .. } => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // Load base configuration from environment and config file
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.database,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.offline,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;
    config.validate()?;

    tracing::info!("Grounded CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Database: {:?}", config.database_path());
    tracing::debug!(
        "Generation: {:?} via {} ({})",
        config.generation.mode,
        config.generation.provider,
        config.generation.model
    );

    // Ensure .grounded directory exists
    config.ensure_grounded_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Import(_) => "import",
        Commands::Doctor(_) => "doctor",
    };
    let span = tracing::info_span!("command", name = command_name);

    // Route to command handlers
    let result = async {
        match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::Import(cmd) => cmd.execute(&config).await,
            Commands::Doctor(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
