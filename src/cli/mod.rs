//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

pub mod commands;
pub mod output;

/// Concept Tree - curriculum dependency graphs and skill progression
#[derive(Parser, Debug)]
#[command(name = "ct")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable machine-readable JSON output (for scripts and agents)
    #[arg(long, short = 'm', global = true)]
    pub machine: bool,

    /// Force plain output (no colors)
    #[arg(long, global = true)]
    pub plain: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/ct/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective output format: `--plain` beats `--machine` beats human.
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        if self.plain {
            OutputFormat::Plain
        } else if self.machine {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database and default config
    Init(commands::init::InitArgs),
    /// Author and inspect curriculum concepts
    Concept(commands::concept::ConceptArgs),
    /// Track a user's skill progression
    Progress(commands::progress::ProgressArgs),
    /// Export or import a complete skill-tree snapshot
    Snapshot(commands::snapshot::SnapshotArgs),
}
