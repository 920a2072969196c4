//! `gt dispatch` -- fan queued beads out to a spawner command.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Result, bail};
use serde_json::json;

use gastown_dispatch::{DispatchConfig, Dispatcher, NoopSpawner, Queue, Spawner};
use gastown_ops::OpsError;

use crate::cli::DispatchArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `gt dispatch` command.
pub fn run(ctx: &RuntimeContext, args: &DispatchArgs) -> Result<()> {
    let mut queue = Queue::new(ctx.ops()?);
    let dispatcher = Dispatcher::new(DispatchConfig {
        dry_run: args.dry_run,
        limit: args.limit,
        parallelism: args.parallel,
    });

    let result = if args.dry_run {
        // The spawner is never invoked on the dry-run branch.
        dispatcher.dispatch(&mut queue, &NoopSpawner)?
    } else {
        let Some(cmd) = &args.spawner else {
            bail!("--spawner <cmd> is required unless --dry-run is set");
        };
        let spawner = ExecSpawner {
            command: cmd.clone(),
            work_dir: ctx.town_root.clone(),
        };
        dispatcher.dispatch(&mut queue, &spawner)?
    };

    if ctx.json {
        output_json(&json!({
            "dry_run": args.dry_run,
            "dispatched": result.dispatched.iter().map(|i| &i.bead_id).collect::<Vec<_>>(),
            "skipped": result.skipped.iter().map(|i| &i.bead_id).collect::<Vec<_>>(),
            "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }));
    } else if !ctx.quiet {
        for item in &result.dispatched {
            println!("dispatched {} -> {}", item.bead_id, item.rig_name);
        }
        for item in &result.skipped {
            println!("skipped {} (over limit)", item.bead_id);
        }
        for error in &result.errors {
            eprintln!("error: {error}");
        }
    }

    if let Some(e) = result.to_error() {
        return Err(e.into());
    }
    Ok(())
}

/// Spawns workers by running `<command> <rig> <bead-id>`.
struct ExecSpawner {
    command: String,
    work_dir: PathBuf,
}

impl Spawner for ExecSpawner {
    fn spawn_in(&self, rig: &str, bead_id: &str) -> gastown_ops::Result<()> {
        let output = Command::new(&self.command)
            .arg(rig)
            .arg(bead_id)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| OpsError::unavailable(format!("{}: {e}", self.command)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OpsError::store(format!(
                "spawner exited {}: {stderr}",
                output.status
            )));
        }
        Ok(())
    }
}
