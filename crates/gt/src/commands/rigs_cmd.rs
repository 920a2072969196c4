//! `gt rigs` -- list the town's registered rigs.

use anyhow::Result;
use serde_json::json;

use gastown_routing::town::{load_rigs_registry, load_town_config};

use crate::context::RuntimeContext;
use crate::output::{output_json, output_pairs};

/// Execute the `gt rigs` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let registry = load_rigs_registry(&ctx.town_root)?;
    // The town store's config is informational here; a town without one is
    // still listable.
    let prefix = load_town_config(&ctx.town_root)
        .map(|c| c.prefix)
        .unwrap_or_default();

    if ctx.json {
        output_json(&json!({
            "town_prefix": prefix,
            "rigs": registry.rigs,
        }));
        return Ok(());
    }

    if registry.rigs.is_empty() {
        println!("no rigs registered");
        return Ok(());
    }
    let rows: Vec<(String, String)> = registry
        .rigs
        .iter()
        .map(|(name, entry)| (name.clone(), entry.git_url.clone()))
        .collect();
    output_pairs(&rows);
    Ok(())
}
