//! CLI module for billstack.
//!
//! This module provides the command-line interface for synthesizing,
//! diffing, deploying and destroying billing stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
