//! `gt redirect` -- resolve and set up `.beads` redirects.

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;

use gastown_routing::redirect;

use crate::cli::{RedirectArgs, RedirectCommands, RedirectResolveArgs, RedirectSetupArgs};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `gt redirect` command.
pub fn run(ctx: &RuntimeContext, args: &RedirectArgs) -> Result<()> {
    match &args.command {
        RedirectCommands::Resolve(a) => cmd_resolve(ctx, a),
        RedirectCommands::Setup(a) => cmd_setup(ctx, a),
    }
}

fn cmd_resolve(ctx: &RuntimeContext, args: &RedirectResolveArgs) -> Result<()> {
    let dir = match &args.dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };
    let resolved = redirect::resolve_beads_dir(&dir);

    if ctx.json {
        output_json(&json!({ "beads_dir": resolved }));
    } else {
        println!("{}", resolved.display());
    }
    Ok(())
}

fn cmd_setup(ctx: &RuntimeContext, args: &RedirectSetupArgs) -> Result<()> {
    let target = redirect::setup_worktree_redirect(
        &PathBuf::from(&args.worktree),
        &PathBuf::from(&args.rig),
    )?;

    if ctx.json {
        output_json(&json!({ "worktree": args.worktree, "target": target }));
    } else if !ctx.quiet {
        println!("{} -> {}", args.worktree, target.display());
    }
    Ok(())
}
