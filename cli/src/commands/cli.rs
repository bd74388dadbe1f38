use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Dependency-ordered plan execution and method refinement")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.cadence/config.toml or ./cadence.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `output.format` (text or jsonl)
    #[arg(long, global = true)]
    pub output: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Plan file (JSON)
    pub plan: PathBuf,

    /// Echo each task instead of running its command
    #[arg(long)]
    pub dry_run: bool,

    /// Per-task command timeout, in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    /// Plan file (JSON)
    pub plan: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct LearnArgs {
    /// Method and objective catalog (TOML)
    #[arg(long)]
    pub catalog: PathBuf,

    /// Objective to pursue
    #[arg(long)]
    pub objective: String,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Cancel the whole learning call after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan in dependency order
    Run(RunArgs),
    /// Check a plan and print its execution order
    Validate(ValidateArgs),
    /// Run the learning loop for one objective
    Learn(LearnArgs),
    /// Print the effective configuration
    Config,
}
