//! CLI module for the knowledge-base builder.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Build a searchable knowledge base from local documents.
#[derive(Debug, Parser)]
#[command(name = "kbase")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build or update the knowledge base from a document directory
    Build(commands::BuildArgs),

    /// Check vector store, ledger, and configuration state
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Delete all stored vectors and recorded progress
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },
}

// FromStr for OutputFormat is implemented in models::report
