//! Coderun CLI
//!
//! A command-line tool for running untrusted code and reporting its output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coderun::{Config, EXAMPLE_CONFIG, ExecutionRequest, ExecutionResult, Runner};
use tokio::io::AsyncReadExt;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

/// Body returned for faults whose details must stay in the logs
const INTERNAL_ERROR: &str = "Internal server error.";

#[derive(Parser)]
#[command(name = "coderun")]
#[command(about = "A tool for running untrusted code in isolated workspaces")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: coderun.toml)
        #[arg(short, long, default_value = "coderun.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a program (compile if needed, then execute)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., python, cpp)
        #[arg(short, long)]
        language: String,

        /// Input file fed to the program's stdin (default: no input)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Answer a JSON execution request with a JSON result
    Request {
        /// Request file (default: stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show which isolation mode the next request would use
    Probe,

    /// List available languages
    Languages,

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // stdout carries only program output and JSON responses
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    match cli.config {
        Some(ref path) => info!(?path, "loading configuration"),
        None => debug!("using default configuration"),
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Run {
            source,
            language,
            input,
        } => run_file(config, &source, language, input.as_deref()).await,
        Commands::Request { file } => answer_request(config, file.as_deref()).await,
        Commands::Probe => probe(config).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Validate and execute one request
///
/// `None` means an internal fault occurred; its cause has been logged.
async fn execute(runner: &Runner, request: &ExecutionRequest) -> Option<ExecutionResult> {
    if let Err(e) = request.validate(runner.config().max_input_size) {
        info!(input_length = request.input.len(), "request rejected");
        return Some(ExecutionResult::failure(e.to_string()));
    }

    match runner.execute(request).await {
        Ok(result) => Some(result),
        Err(e) => {
            error!(error = %e, "internal fault while executing request");
            None
        }
    }
}

async fn run_file(
    config: Config,
    source: &Path,
    language: String,
    input: Option<&Path>,
) -> Result<()> {
    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let input = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .context("failed to read input file")?,
        None => String::new(),
    };

    let runner = Runner::new(config);
    let request = ExecutionRequest::new(code, language, input);

    let Some(result) = execute(&runner, &request).await else {
        eprintln!("{INTERNAL_ERROR}");
        std::process::exit(1);
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    if result.has_error() {
        eprintln!("{}", result.error);
        std::process::exit(1);
    }
    Ok(())
}

async fn answer_request(config: Config, file: Option<&Path>) -> Result<()> {
    let body = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .context("failed to read request file")?,
        None => {
            let mut body = String::new();
            tokio::io::stdin()
                .read_to_string(&mut body)
                .await
                .context("failed to read request from stdin")?;
            body
        }
    };

    let request: ExecutionRequest =
        serde_json::from_str(&body).context("malformed execution request")?;

    let runner = Runner::new(config);
    match execute(&runner, &request).await {
        Some(result) => {
            let response =
                serde_json::to_string(&result).context("failed to serialize response")?;
            println!("{response}");
            Ok(())
        }
        None => {
            println!("{}", serde_json::json!({ "error": INTERNAL_ERROR }));
            std::process::exit(1);
        }
    }
}

async fn probe(config: Config) -> Result<()> {
    let policy = config.isolation;
    let runner = Runner::new(config);

    match runner.isolation_mode().await {
        Ok(mode) => {
            println!("Isolation policy: {policy:?}");
            println!("Next request runs: {mode}");
            Ok(())
        }
        Err(reason) => {
            println!("Isolation policy: {policy:?}");
            println!("Container runtime unavailable: {reason}");
            std::process::exit(1);
        }
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        let local = if lang.local { ", local fallback" } else { "" };
        println!("  {:<15} {} ({lang_type}{local})", id, lang.name);
    }
}

fn show_config(config: &Config) {
    println!("Isolation policy: {:?}", config.isolation);
    println!("Docker binary: {}", config.docker_path.display());
    println!("Workspace root: {}", config.workspace_root().display());
    println!();
    println!("Timeouts:");
    println!("  Compile: {:?}", config.compile_timeout());
    println!("  Execution: {:?}", config.execution_timeout());
    println!("  Health probe: {:?}", config.probe_timeout());
    println!();
    println!("Container limits:");
    println!("  Memory: {}", config.container.memory);
    println!("  CPUs: {}", config.container.cpus);
    println!("  Max processes: {:?}", config.container.pids_limit);
    println!("  Network: {:?}", config.container.network);
    println!("  Run as host user: {}", config.container.run_as_host_user);
    println!();
    println!("Max input size: {} bytes", config.max_input_size);
    println!("Allowed origins: {}", config.allowed_origins.join(", "));
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
