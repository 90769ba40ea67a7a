//! ct snapshot - export/import a complete skill tree.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::{self, OutputFormat};
use crate::error::Result;
use crate::snapshot::{self, SnapshotDocument};

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// User id
    #[arg(long, global = true, default_value = "")]
    pub user: String,

    /// Skill tree name (default from config)
    #[arg(long, global = true)]
    pub tree: Option<String>,

    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Write the user's complete skill tree as a JSON document
    Export(ExportArgs),
    /// Validate and apply a previously exported document
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file (stdout when omitted)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot document to import
    pub file: PathBuf,
}

pub fn run(ctx: &AppContext, args: &SnapshotArgs, format: OutputFormat) -> Result<()> {
    if args.user.is_empty() {
        return Err(crate::error::CtError::Validation(
            "--user is required".to_string(),
        ));
    }
    let tree = ctx.tree_name(args.tree.as_deref());
    match &args.command {
        SnapshotCommand::Export(export) => run_export(ctx, &args.user, &tree, export, format),
        SnapshotCommand::Import(import) => run_import(ctx, &args.user, &tree, import, format),
    }
}

fn run_export(
    ctx: &AppContext,
    user: &str,
    tree: &str,
    args: &ExportArgs,
    format: OutputFormat,
) -> Result<()> {
    let graph = ctx.load_graph()?.snapshot();
    let record = ctx.load_record(user, tree)?;
    let doc = snapshot::export(&record, &graph);
    let json = serde_json::to_string_pretty(&doc)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            output::success(
                format,
                &format!(
                    "exported {} concepts for {user}/{tree} to {}",
                    doc.concepts.len(),
                    path.display()
                ),
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct ImportReport {
    user_id: String,
    skill_tree_name: String,
    concepts: usize,
    completed: usize,
    in_progress: usize,
}

fn run_import(
    ctx: &AppContext,
    user: &str,
    tree: &str,
    args: &ImportArgs,
    format: OutputFormat,
) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)?;
    let mut doc: SnapshotDocument = serde_json::from_str(&raw)?;
    // The document is applied to the addressed user/tree, not whatever pair
    // it was exported from.
    doc.user_id = user.to_string();
    doc.skill_tree_name = tree.to_string();

    // Exclusive across processes for the duration of validation and apply.
    let _lock = ctx.import_lock()?;
    let (concepts, record) = snapshot::decode(&doc)?;
    ctx.db.import(&concepts, &record)?;
    info!(user_id = user, tree, concepts = concepts.len(), "snapshot imported");

    let report = ImportReport {
        user_id: record.user_id.clone(),
        skill_tree_name: record.skill_tree_name.clone(),
        concepts: concepts.len(),
        completed: record.completed.len(),
        in_progress: record.in_progress.len(),
    };
    output::emit(format, &report, |report| {
        output::success(
            format,
            &format!(
                "imported {} concepts, {} completed, {} in progress for {}/{}",
                report.concepts,
                report.completed,
                report.in_progress,
                report.user_id,
                report.skill_tree_name
            ),
        );
    })
}
