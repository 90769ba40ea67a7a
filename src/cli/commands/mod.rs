//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::{Commands, OutputFormat};
use crate::error::Result;

pub mod concept;
pub mod init;
pub mod progress;
pub mod snapshot;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Init(args) => init::run(ctx, args, format),
        Commands::Concept(args) => concept::run(ctx, args, format),
        Commands::Progress(args) => progress::run(ctx, args, format),
        Commands::Snapshot(args) => snapshot::run(ctx, args, format),
    }
}
