//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the fabula binary.

mod commands;
mod input;
mod play;
mod run;

pub use commands::{Cli, Commands};
pub use run::{describe, load_config, play, show};
