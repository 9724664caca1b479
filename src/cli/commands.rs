//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// billstack - Declarative Stripe billing infrastructure.
#[derive(Parser, Debug)]
#[command(name = "billstack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the definition file.
    #[arg(short, long, global = true, env = "BILLSTACK_DEFINITION")]
    pub definition: Option<PathBuf>,

    /// Stripe secret API key.
    #[arg(long, global = true, env = "STRIPE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize the stack and write its manifest.
    Synth,

    /// Show what a deploy would change.
    Diff {
        /// Show a patch for every changed resource.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Reconcile the remote account with the definition.
    Deploy {
        /// Update products even when nothing changed since the last deploy.
        #[arg(long)]
        force_update: bool,
    },

    /// Delete or deactivate every resource of the stack.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect or edit the state file.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show tracked resources.
    Show,

    /// Stop tracking a resource without touching it remotely.
    Forget {
        /// Logical id of the resource.
        logical_id: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
