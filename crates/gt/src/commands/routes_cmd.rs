//! `gt routes` -- inspect the town route table.

use anyhow::Result;
use serde_json::json;

use crate::cli::{RoutesArgs, RoutesCommands};
use crate::context::RuntimeContext;
use crate::output::{output_json, output_pairs};

/// Execute the `gt routes` command.
pub fn run(ctx: &RuntimeContext, args: &RoutesArgs) -> Result<()> {
    match args.command.as_ref().unwrap_or(&RoutesCommands::List) {
        RoutesCommands::List => cmd_list(ctx),
        RoutesCommands::Conflicts => cmd_conflicts(ctx),
    }
}

fn cmd_list(ctx: &RuntimeContext) -> Result<()> {
    let router = ctx.router()?;
    let routes = router.table().routes().to_vec();

    if ctx.json {
        output_json(&routes);
        return Ok(());
    }
    if routes.is_empty() {
        println!("no routes registered");
        return Ok(());
    }
    let rows: Vec<(String, String)> = routes
        .iter()
        .map(|r| (r.prefix.clone(), r.path.clone()))
        .collect();
    output_pairs(&rows);
    Ok(())
}

fn cmd_conflicts(ctx: &RuntimeContext) -> Result<()> {
    let router = ctx.router()?;
    let conflicts = router.table().find_conflicts();

    if ctx.json {
        output_json(&json!(conflicts));
        return Ok(());
    }
    if conflicts.is_empty() {
        println!("no prefix conflicts");
        return Ok(());
    }
    for (prefix, paths) in conflicts {
        println!("{prefix} claimed by:");
        for path in paths {
            println!("  {path}");
        }
    }
    Ok(())
}
