//! `gt hook` -- hook a bead to an agent.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use gastown_attach::HookWriter;

use crate::cli::HookArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `gt hook` command.
pub fn run(ctx: &RuntimeContext, args: &HookArgs) -> Result<()> {
    let writer = HookWriter::new(Arc::new(ctx.router()?));
    writer.hook(&args.bead_id, &args.agent)?;

    if ctx.json {
        output_json(&json!({
            "bead_id": args.bead_id,
            "agent": args.agent,
            "status": "hooked",
        }));
    } else if !ctx.quiet {
        println!("hooked {} to {}", args.bead_id, args.agent);
    }
    Ok(())
}
