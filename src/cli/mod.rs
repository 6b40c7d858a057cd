//! CLI interface for paper-risk
//!
//! Provides subcommands for:
//! - `replay`: Run a JSON-lines event log through a paper engine
//! - `config`: Show the effective configuration

mod replay;

pub use replay::{
    parse_events, OutputFormat, Replay, ReplayArgs, ReplayEvent, ReplayReport, ReplaySummary,
    UserReport,
};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "paper-risk")]
#[command(about = "Risk gate and paper execution simulator for automated trading")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay an event log and print per-user statistics
    Replay(ReplayArgs),
    /// Show the effective configuration
    Config,
}
