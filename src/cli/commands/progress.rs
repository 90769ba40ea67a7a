//! ct progress - per-user skill progression.

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{self, OutputFormat};
use crate::core::progress::{ProgressSummary, UserSkillRecord};
use crate::error::Result;
use crate::progress as tracker;

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// User id
    #[arg(long, global = true, default_value = "")]
    pub user: String,

    /// Skill tree name (default from config)
    #[arg(long, global = true)]
    pub tree: Option<String>,

    #[command(subcommand)]
    pub command: ProgressCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProgressCommand {
    /// Show the user's record and summary stats
    Show,
    /// Mark a concept as started (must be available)
    Start(ConceptIdArg),
    /// Mark a concept as completed (prerequisites re-checked)
    Complete(ConceptIdArg),
    /// Attach a verification marker to a completed concept
    Verify(VerifyArgs),
    /// Concepts the user can work on right now
    Available,
    /// Concepts still locked, with their unmet prerequisites
    Blocked,
}

#[derive(Args, Debug)]
pub struct ConceptIdArg {
    /// Concept id
    pub concept_id: String,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Concept id
    pub concept_id: String,

    /// Opaque verification marker (e.g., an assessment outcome id)
    #[arg(long)]
    pub marker: String,
}

pub fn run(ctx: &AppContext, args: &ProgressArgs, format: OutputFormat) -> Result<()> {
    if args.user.is_empty() {
        return Err(crate::error::CtError::Validation(
            "--user is required".to_string(),
        ));
    }
    let tree = ctx.tree_name(args.tree.as_deref());
    match &args.command {
        ProgressCommand::Show => run_show(ctx, &args.user, &tree, format),
        ProgressCommand::Start(arg) => {
            run_transition(ctx, &args.user, &tree, format, |record, graph| {
                tracker::start(record, graph, &arg.concept_id)?;
                Ok(format!("started '{}'", arg.concept_id))
            })
        }
        ProgressCommand::Complete(arg) => {
            run_transition(ctx, &args.user, &tree, format, |record, graph| {
                tracker::complete(record, graph, &arg.concept_id)?;
                Ok(format!("completed '{}'", arg.concept_id))
            })
        }
        ProgressCommand::Verify(arg) => {
            run_transition(ctx, &args.user, &tree, format, |record, _graph| {
                tracker::mark_verified(record, &arg.concept_id, &arg.marker)?;
                Ok(format!("verified '{}' ({})", arg.concept_id, arg.marker))
            })
        }
        ProgressCommand::Available => run_available(ctx, &args.user, &tree, format),
        ProgressCommand::Blocked => run_blocked(ctx, &args.user, &tree, format),
    }
}

#[derive(Serialize)]
struct ShowReport {
    record: UserSkillRecord,
    summary: ProgressSummary,
}

fn run_show(ctx: &AppContext, user: &str, tree: &str, format: OutputFormat) -> Result<()> {
    let record = ctx.load_record(user, tree)?;
    let summary = ProgressSummary::of(&record);
    let report = ShowReport { record, summary };
    output::emit(format, &report, |report| {
        output::heading(
            format,
            &format!("{} / {}", report.record.user_id, report.record.skill_tree_name),
        );
        println!(
            "  {} completed, {} in progress, {} verified ({:.0}%)",
            report.summary.completed,
            report.summary.in_progress,
            report.summary.verified,
            report.summary.progress_percentage
        );
        for id in &report.record.completed {
            let marker = report
                .record
                .verified
                .get(id)
                .map(|m| format!(" (verified: {m})"))
                .unwrap_or_default();
            println!("  [done] {id}{marker}");
        }
        for id in &report.record.in_progress {
            println!("  [wip]  {id}");
        }
    })
}

/// Load record + graph, apply a transition, persist with the version check.
fn run_transition(
    ctx: &AppContext,
    user: &str,
    tree: &str,
    format: OutputFormat,
    apply: impl FnOnce(&mut UserSkillRecord, &crate::graph::query::GraphSnapshot) -> Result<String>,
) -> Result<()> {
    let graph = ctx.load_graph()?.snapshot();
    let mut record = ctx.load_record(user, tree)?;
    let message = apply(&mut record, &graph)?;
    record.version += 1;
    record.updated_at = Utc::now();
    ctx.db.save_user(&record)?;
    output::emit(format, &record, |_record| {
        output::success(format, &message);
    })
}

fn run_available(ctx: &AppContext, user: &str, tree: &str, format: OutputFormat) -> Result<()> {
    let graph = ctx.load_graph()?.snapshot();
    let record = ctx.load_record(user, tree)?;
    let available = tracker::available_concepts(&record, &graph);
    output::emit(format, &available, |available| {
        output::heading(format, &format!("{} available", available.len()));
        for concept in available {
            println!(
                "  {}  {} (difficulty {})",
                concept.id, concept.title, concept.difficulty
            );
        }
    })
}

fn run_blocked(ctx: &AppContext, user: &str, tree: &str, format: OutputFormat) -> Result<()> {
    let graph = ctx.load_graph()?.snapshot();
    let record = ctx.load_record(user, tree)?;
    let blocked = tracker::blocked_concepts(&record, &graph);
    output::emit(format, &blocked, |blocked| {
        output::heading(format, &format!("{} blocked", blocked.len()));
        for entry in blocked {
            println!(
                "  {}  {} (blocked by: {})",
                entry.concept.id,
                entry.concept.title,
                entry.blocked_by.join(", ")
            );
        }
    })
}
