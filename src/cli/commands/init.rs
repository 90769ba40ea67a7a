//! ct init - create the database and report where it lives.

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{self, OutputFormat};
use crate::error::Result;

#[derive(Args, Debug, Default)]
pub struct InitArgs {}

#[derive(Serialize)]
struct InitReport {
    db_path: String,
    schema_version: u32,
    concepts: usize,
}

pub fn run(ctx: &AppContext, _args: &InitArgs, format: OutputFormat) -> Result<()> {
    // Opening the context already created the database and ran migrations.
    let report = InitReport {
        db_path: ctx.db_path().display().to_string(),
        schema_version: ctx.db.schema_version(),
        concepts: ctx.db.load_concepts()?.len(),
    };
    output::emit(format, &report, |report| {
        output::success(format, &format!("database ready at {}", report.db_path));
        println!(
            "  schema version {}, {} concepts",
            report.schema_version, report.concepts
        );
    })
}
