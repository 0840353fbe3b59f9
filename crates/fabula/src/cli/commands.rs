//! CLI command definitions.

use clap::{Parser, Subcommand};
use fabula_interface::SessionId;
use std::path::PathBuf;

/// Fabula - multi-agent storytelling sessions
#[derive(Parser, Debug)]
#[command(name = "fabula")]
#[command(about = "Write a story chapter by chapter with a chain of language-model roles", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute (defaults to `play`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file layered over the bundled defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Role chain to run instead of the configured one
    #[arg(long, global = true)]
    pub chain: Option<String>,

    /// Keep sessions in memory instead of on disk
    #[arg(long, global = true)]
    pub memory: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive session, or continue a stored one
    Play {
        /// Session to resume
        #[arg(long)]
        resume: Option<SessionId>,
    },

    /// Print a stored session
    Show {
        /// Session to print
        session: SessionId,
    },

    /// List the configured dimensions and role chains
    Config,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Play { resume: None }
    }
}
