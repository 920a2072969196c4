//! `gt version` -- version information.

use anyhow::Result;
use serde_json::json;

use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `gt version` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    if ctx.json {
        output_json(&json!({ "name": "gt", "version": version }));
    } else {
        println!("gt {version}");
    }
    Ok(())
}
