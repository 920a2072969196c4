//! `gt queue` -- ready-queue management.

use anyhow::Result;
use serde_json::json;

use gastown_dispatch::Queue;

use crate::cli::{QueueArgs, QueueCommands};
use crate::context::RuntimeContext;
use crate::output::{output_json, output_pairs};

/// Execute the `gt queue` command.
pub fn run(ctx: &RuntimeContext, args: &QueueArgs) -> Result<()> {
    match &args.command {
        QueueCommands::Add(a) => cmd_add(ctx, &a.bead_id),
        QueueCommands::List => cmd_list(ctx),
        QueueCommands::Rm(a) => cmd_rm(ctx, &a.bead_id),
        QueueCommands::Clear => cmd_clear(ctx),
    }
}

fn cmd_add(ctx: &RuntimeContext, bead_id: &str) -> Result<()> {
    let queue = Queue::new(ctx.ops()?);
    queue.add(bead_id)?;
    if !ctx.quiet {
        println!("queued {bead_id}");
    }
    Ok(())
}

fn cmd_list(ctx: &RuntimeContext) -> Result<()> {
    let mut queue = Queue::new(ctx.ops()?);
    let items = queue.load()?;

    if ctx.json {
        let rows: Vec<serde_json::Value> = items
            .iter()
            .map(|i| {
                json!({
                    "bead_id": i.bead_id,
                    "title": i.title,
                    "rig": i.rig_name,
                })
            })
            .collect();
        output_json(&rows);
        return Ok(());
    }

    if items.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    let rows: Vec<(String, String)> = items
        .iter()
        .map(|i| {
            (
                i.bead_id.clone(),
                format!("[{}] {}", i.rig_name, i.title),
            )
        })
        .collect();
    output_pairs(&rows);
    Ok(())
}

fn cmd_rm(ctx: &RuntimeContext, bead_id: &str) -> Result<()> {
    let mut queue = Queue::new(ctx.ops()?);
    queue.remove(bead_id)?;
    if !ctx.quiet {
        println!("removed {bead_id}");
    }
    Ok(())
}

fn cmd_clear(ctx: &RuntimeContext) -> Result<()> {
    let mut queue = Queue::new(ctx.ops()?);
    let removed = queue.clear()?;
    if !ctx.quiet {
        println!("removed {removed} bead(s) from the queue");
    }
    Ok(())
}
