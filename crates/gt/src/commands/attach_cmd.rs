//! `gt attach` -- attach a formula to a bead.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::json;

use gastown_attach::{AttachOptions, FormulaAttacher};

use crate::cli::AttachArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `gt attach` command.
pub fn run(ctx: &RuntimeContext, args: &AttachArgs) -> Result<()> {
    let mut vars = Vec::new();
    for raw in &args.vars {
        let Some((key, value)) = raw.split_once('=') else {
            bail!("--var takes key=value, got {raw:?}");
        };
        vars.push((key.to_string(), value.to_string()));
    }

    let attacher = FormulaAttacher::new(Arc::new(ctx.router()?));
    let root = attacher.attach(
        &args.formula,
        &args.bead_id,
        &AttachOptions {
            skip_cook: args.skip_cook,
            vars,
            mode: args.mode.clone().unwrap_or_default(),
            dispatched_by: ctx.actor.clone(),
            merge_strategy: args.merge_strategy.clone().unwrap_or_default(),
            no_merge: args.no_merge,
            ..Default::default()
        },
    )?;

    if ctx.json {
        output_json(&json!({
            "bead_id": args.bead_id,
            "formula": args.formula,
            "attached_molecule": root,
        }));
    } else if !ctx.quiet {
        println!("attached {} to {} (root {root})", args.formula, args.bead_id);
    }
    Ok(())
}
