use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::application::ApplicationBuilder;
use crate::config::{Config, CONFIG_PATH_ENV};
use crate::interpreter::Interpreter;
use crate::parser;
use crate::stdlib::{Registry, Services};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence - a declarative DSL over an async orchestration engine", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a program and run its triggers until Ctrl-C
    Run {
        /// Program file
        file: PathBuf,

        /// Print the result and exit without starting triggers
        #[arg(long)]
        no_triggers: bool,

        /// Run as a trusted system context
        #[arg(long)]
        system: bool,
    },

    /// Print the AST of a program as JSON
    Parse {
        /// Program file
        file: PathBuf,
    },

    /// Check that a program parses
    Check {
        /// Program file
        file: PathBuf,
    },

    /// Evaluate a single expression
    Eval {
        /// Expression source
        expression: String,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    if let Some(config_path) = &cli.config {
        std::env::set_var(CONFIG_PATH_ENV, config_path);
    }

    // Load eagerly so config errors surface before any command output
    let config = Config::load()?;
    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Run {
            file,
            no_triggers,
            system,
        } => {
            let app = ApplicationBuilder::new().config(config).build()?;
            let program = app.run_file(&file, system).await?;
            println!("{}", serde_json::to_string_pretty(&program.value.to_json())?);

            if no_triggers || program.triggers.is_empty() {
                return Ok(());
            }

            let scheduler = app.start_triggers(program);
            println!("✓ {} trigger(s) running, press Ctrl-C to stop", scheduler.len());
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            scheduler.shutdown().await;
            println!("✓ Triggers stopped");
        }

        Commands::Parse { file } => {
            let source = read_source(&file).await?;
            let program = parser::parse_program(&source)?;
            println!("{}", serde_json::to_string_pretty(&program)?);
        }

        Commands::Check { file } => {
            let source = read_source(&file).await?;
            parser::parse_program(&source)?;
            println!("✓ {} parsed", file.display());
        }

        Commands::Eval { expression } => {
            let registry = Registry::with_services(Services::from_config(&config));
            let mut interpreter = Interpreter::new(&registry);
            let value = interpreter.eval_expression(&expression).await?;
            println!("{}", serde_json::to_string_pretty(&value.to_json())?);
        }
    }

    Ok(())
}

async fn read_source(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

/// `RUST_LOG` wins over the configured filter
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
