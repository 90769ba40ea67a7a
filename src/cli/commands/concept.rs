//! ct concept - author and inspect curriculum concepts.

use clap::{Args, Subcommand};
use itertools::Itertools;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{self, OutputFormat};
use crate::core::concept::{Concept, ConceptDraft, ConceptPatch};
use crate::error::Result;
use crate::graph::query::DependencyTree;
use crate::graph::store::ListFilter;

#[derive(Args, Debug)]
pub struct ConceptArgs {
    #[command(subcommand)]
    pub command: ConceptCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConceptCommand {
    /// Create a new concept
    Add(AddArgs),
    /// Show one concept
    Show(IdArg),
    /// List concepts, optionally filtered by category
    List(ListArgs),
    /// Update fields of an existing concept
    Update(UpdateArgs),
    /// Delete a concept (fails while dependents exist)
    Rm(IdArg),
    /// Archive a concept (kept for history, excluded from availability)
    Archive(IdArg),
    /// Direct prerequisites of a concept
    Deps(IdArg),
    /// Concepts that list this one as a prerequisite
    Dependents(IdArg),
    /// Full transitive prerequisite closure
    Ancestors(IdArg),
    /// Full transitive dependent closure
    Descendants(IdArg),
    /// Nested prerequisite tree for a concept, or a category overview
    Tree(TreeArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Concept title
    #[arg(long)]
    pub title: String,

    /// Stable id (slug); generated when omitted
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub category: String,

    /// Difficulty on a 1-10 scale
    #[arg(long, default_value_t = 1)]
    pub difficulty: u8,

    /// Prerequisite concept id (repeatable)
    #[arg(long = "prereq", value_name = "ID")]
    pub prerequisites: Vec<String>,
}

#[derive(Args, Debug)]
pub struct IdArg {
    /// Concept id
    pub id: String,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only concepts in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Include archived concepts
    #[arg(long)]
    pub include_archived: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Concept id
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub difficulty: Option<u8>,

    /// Replace the prerequisite set (repeatable)
    #[arg(long = "prereq", value_name = "ID")]
    pub prerequisites: Vec<String>,

    /// Clear all prerequisites
    #[arg(long, conflicts_with = "prerequisites")]
    pub no_prereqs: bool,

    /// Restore an archived concept
    #[arg(long)]
    pub unarchive: bool,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Root concept id for a prerequisite tree
    pub id: Option<String>,

    /// Category overview instead of a single concept
    #[arg(long, conflicts_with = "id")]
    pub category: Option<String>,
}

pub fn run(ctx: &AppContext, args: &ConceptArgs, format: OutputFormat) -> Result<()> {
    match &args.command {
        ConceptCommand::Add(add) => run_add(ctx, add, format),
        ConceptCommand::Show(arg) => run_show(ctx, arg, format),
        ConceptCommand::List(list) => run_list(ctx, list, format),
        ConceptCommand::Update(update) => run_update(ctx, update, format),
        ConceptCommand::Rm(arg) => run_rm(ctx, arg, format),
        ConceptCommand::Archive(arg) => run_archive(ctx, arg, format),
        ConceptCommand::Deps(arg) => run_edges(ctx, arg, format, EdgeKind::Deps),
        ConceptCommand::Dependents(arg) => run_edges(ctx, arg, format, EdgeKind::Dependents),
        ConceptCommand::Ancestors(arg) => run_edges(ctx, arg, format, EdgeKind::Ancestors),
        ConceptCommand::Descendants(arg) => run_edges(ctx, arg, format, EdgeKind::Descendants),
        ConceptCommand::Tree(tree) => run_tree(ctx, tree, format),
    }
}

fn run_add(ctx: &AppContext, args: &AddArgs, format: OutputFormat) -> Result<()> {
    let store = ctx.load_graph()?;
    let concept = store.create_concept(ConceptDraft {
        id: args.id.clone(),
        title: args.title.clone(),
        description: args.description.clone(),
        category: args.category.clone(),
        difficulty: args.difficulty,
        prerequisites: args.prerequisites.clone(),
    })?;
    ctx.db.save_concept(&concept)?;

    output::emit(format, &concept, |concept| {
        output::success(format, &format!("created concept '{}'", concept.id));
        print_concept(format, concept);
    })
}

fn run_show(ctx: &AppContext, args: &IdArg, format: OutputFormat) -> Result<()> {
    let concept = ctx.load_graph()?.get_concept(&args.id)?;
    output::emit(format, &concept, |concept| print_concept(format, concept))
}

fn run_list(ctx: &AppContext, args: &ListArgs, format: OutputFormat) -> Result<()> {
    let concepts = ctx.load_graph()?.list_concepts(&ListFilter {
        category: args.category.clone(),
        include_archived: args.include_archived,
    });
    output::emit(format, &concepts, |concepts| {
        output::heading(format, &format!("{} concepts", concepts.len()));
        for concept in concepts {
            let archived = if concept.archived { " [archived]" } else { "" };
            println!(
                "  {}  {} (difficulty {}){archived}",
                concept.id, concept.title, concept.difficulty
            );
        }
    })
}

fn run_update(ctx: &AppContext, args: &UpdateArgs, format: OutputFormat) -> Result<()> {
    let prerequisites = if args.no_prereqs {
        Some(Vec::new())
    } else if args.prerequisites.is_empty() {
        None
    } else {
        Some(args.prerequisites.clone())
    };
    let store = ctx.load_graph()?;
    let concept = store.update_concept(
        &args.id,
        ConceptPatch {
            title: args.title.clone(),
            description: args.description.clone(),
            category: args.category.clone(),
            difficulty: args.difficulty,
            prerequisites,
            archived: args.unarchive.then_some(false),
        },
    )?;
    ctx.db.save_concept(&concept)?;

    output::emit(format, &concept, |concept| {
        output::success(format, &format!("updated concept '{}'", concept.id));
        print_concept(format, concept);
    })
}

fn run_rm(ctx: &AppContext, args: &IdArg, format: OutputFormat) -> Result<()> {
    let store = ctx.load_graph()?;
    store.delete_concept(&args.id)?;
    ctx.db.delete_concept(&args.id)?;
    output::success(format, &format!("deleted concept '{}'", args.id));
    Ok(())
}

fn run_archive(ctx: &AppContext, args: &IdArg, format: OutputFormat) -> Result<()> {
    let store = ctx.load_graph()?;
    let concept = store.archive_concept(&args.id)?;
    ctx.db.save_concept(&concept)?;
    output::success(format, &format!("archived concept '{}'", concept.id));
    Ok(())
}

enum EdgeKind {
    Deps,
    Dependents,
    Ancestors,
    Descendants,
}

#[derive(Serialize)]
struct EdgeReport {
    concept_id: String,
    relation: &'static str,
    ids: Vec<String>,
}

fn run_edges(ctx: &AppContext, args: &IdArg, format: OutputFormat, kind: EdgeKind) -> Result<()> {
    let graph = ctx.load_graph()?.snapshot();
    let (relation, ids) = match kind {
        EdgeKind::Deps => ("dependencies", graph.dependencies(&args.id)?),
        EdgeKind::Dependents => ("dependents", graph.dependents(&args.id)?),
        EdgeKind::Ancestors => ("ancestors", graph.all_ancestors(&args.id)?),
        EdgeKind::Descendants => ("descendants", graph.all_descendants(&args.id)?),
    };
    let report = EdgeReport {
        concept_id: args.id.clone(),
        relation,
        ids,
    };
    output::emit(format, &report, |report| {
        output::heading(
            format,
            &format!("{} of '{}' ({})", report.relation, report.concept_id, report.ids.len()),
        );
        for id in &report.ids {
            println!("  {id}");
        }
    })
}

fn run_tree(ctx: &AppContext, args: &TreeArgs, format: OutputFormat) -> Result<()> {
    let graph = ctx.load_graph()?.snapshot();
    if let Some(id) = &args.id {
        let tree = graph.dependency_tree(id)?;
        return output::emit(format, &tree, |tree| {
            print_tree(tree, 0);
        });
    }
    let category = graph.category_graph(args.category.as_deref());
    output::emit(format, &category, |category| {
        output::heading(
            format,
            &format!("{} ({} concepts)", category.category, category.total_concepts),
        );
        for (id, node) in &category.concepts {
            println!("  {}  {} (difficulty {})", id, node.title, node.difficulty);
            if !node.prerequisites.is_empty() {
                println!("      requires: {}", node.prerequisites.join(", "));
            }
        }
    })
}

fn print_tree(tree: &DependencyTree, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{}  {} (difficulty {})",
        tree.concept_id, tree.title, tree.difficulty
    );
    for child in &tree.prerequisites {
        print_tree(child, depth + 1);
    }
}

fn print_concept(format: OutputFormat, concept: &Concept) {
    println!("  id:          {}", concept.id);
    println!("  title:       {}", concept.title);
    if !concept.description.is_empty() {
        println!("  description: {}", concept.description);
    }
    if !concept.category.is_empty() {
        println!("  category:    {}", concept.category);
    }
    println!("  difficulty:  {}", concept.difficulty);
    if !concept.prerequisites.is_empty() {
        println!("  requires:    {}", concept.prerequisites.iter().join(", "));
    }
    if concept.archived {
        println!("  archived:    yes");
    }
    println!(
        "  {}",
        output::dim(format, &format!("updated {}", concept.updated_at.to_rfc3339()))
    );
}
