//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: execute a task list with an external worker program
//! - `validate`: check a task list and show its ready set
//! - `show-config`: show configuration discovery information
//! - `init-config`: write a default user configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    Validate {
        tasks_file: PathBuf,
        config_override: Option<PathBuf>,
    },
    ShowConfig { config_override: Option<PathBuf> },
    InitConfig,
}

/// Everything `taskwave run` needs after parsing
#[derive(Debug)]
pub struct RunConfig {
    pub tasks_file: PathBuf,
    pub goal: String,
    pub config_override: Option<PathBuf>,
    pub max_concurrent: Option<usize>,
    pub max_waves: Option<u32>,
    pub max_retries: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub dry_run: bool,
    /// Worker program and its arguments; empty means "use the config file"
    pub worker_command: Vec<String>,
}

#[derive(Debug, Parser)]
#[command(name = "taskwave")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run interdependent tasks in parallel waves with retries")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute a JSON task list
    Run {
        /// Path to the JSON task list
        tasks: PathBuf,
        /// Overall goal handed to every worker
        #[arg(short = 'g', long = "goal")]
        goal: String,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Maximum number of tasks running at once
        #[arg(long = "max-concurrent", value_name = "N")]
        max_concurrent: Option<usize>,
        /// Maximum number of waves
        #[arg(long = "max-waves", value_name = "N")]
        max_waves: Option<u32>,
        /// Attempts per task unless the task list overrides it
        #[arg(long = "max-retries", value_name = "N")]
        max_retries: Option<u32>,
        /// Per-attempt timeout in seconds
        #[arg(long = "timeout", value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Show the planned waves without running anything
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
        /// Worker program and arguments, after `--`
        #[arg(last = true, value_name = "PROGRAM")]
        worker: Vec<String>,
    },
    /// Validate a JSON task list
    Validate {
        /// Path to the JSON task list
        tasks: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Create a default configuration in ~/.taskwave
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                tasks,
                goal,
                config,
                max_concurrent,
                max_waves,
                max_retries,
                timeout_secs,
                dry_run,
                worker,
                ..
            }) => {
                if goal.trim().is_empty() {
                    return Err("The goal must not be empty".to_string());
                }

                Ok(ExecutionMode::Run(RunConfig {
                    tasks_file: tasks.clone(),
                    goal: goal.clone(),
                    config_override: config.clone(),
                    max_concurrent: *max_concurrent,
                    max_waves: *max_waves,
                    max_retries: *max_retries,
                    timeout_secs: *timeout_secs,
                    dry_run: *dry_run,
                    worker_command: worker.clone(),
                }))
            }
            Some(Commands::Validate { tasks, config, .. }) => Ok(ExecutionMode::Validate {
                tasks_file: tasks.clone(),
                config_override: config.clone(),
            }),
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'taskwave --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    /// Whether the selected command asked for verbose output
    pub fn verbose(&self) -> bool {
        matches!(
            self.command,
            Some(Commands::Run { verbose: true, .. })
                | Some(Commands::Validate { verbose: true, .. })
        )
    }
}
