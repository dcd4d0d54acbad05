//! CLI argument definitions.
//!
//! All Clap derive structs for `quizroom` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::logging::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Live multi-player trivia session server.
#[derive(Parser, Debug)]
#[command(name = "quizroom", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(long, default_value = "human", global = true)]
    pub log_format: LogFormat,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "QUIZROOM_COLOR")]
    pub color: ColorChoice,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trivia session server.
    Serve(ServeArgs),

    /// Validate configuration files without starting the server.
    Check(CheckArgs),
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "QUIZROOM_CONFIG")]
    pub config: PathBuf,

    /// Bind the gateway on `[host:]port`, overriding the config file.
    #[arg(long)]
    pub bind: Option<String>,

    /// Serve Prometheus metrics on this port, overriding the config file.
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

// ============================================================================
// Tests
// ============================================================================
