//! `gt convoy` -- tracking-convoy management.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use gastown_attach::{ConvoyOptions, ConvoyTracker};

use crate::cli::{ConvoyArgs, ConvoyCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `gt convoy` command.
pub fn run(ctx: &RuntimeContext, args: &ConvoyArgs) -> Result<()> {
    let tracker = ConvoyTracker::new(Arc::new(ctx.router()?));
    match &args.command {
        ConvoyCommands::Create(a) => {
            let convoy_id = tracker.auto_create(
                &a.bead_id,
                &a.title,
                a.assignee.as_deref(),
                &ConvoyOptions {
                    owned_by: a.owned_by.clone(),
                    merge: a.merge.clone(),
                },
            )?;
            if ctx.json {
                output_json(&json!({ "convoy_id": convoy_id, "tracks": a.bead_id }));
            } else if !ctx.quiet {
                println!("{convoy_id} tracks {}", a.bead_id);
            }
        }
        ConvoyCommands::Add(a) => {
            tracker.add_to(&a.convoy_id, &a.bead_id)?;
            if ctx.json {
                output_json(&json!({ "convoy_id": a.convoy_id, "tracks": a.bead_id }));
            } else if !ctx.quiet {
                println!("{} tracks {}", a.convoy_id, a.bead_id);
            }
        }
        ConvoyCommands::Tracked(a) => {
            let tracked = tracker.is_tracked(&a.bead_id)?;
            if ctx.json {
                output_json(&json!({ "bead_id": a.bead_id, "convoy_id": tracked }));
            } else {
                match tracked {
                    Some(id) => println!("{id}"),
                    None => println!("not tracked"),
                }
            }
        }
    }
    Ok(())
}
