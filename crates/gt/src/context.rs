//! Runtime context for command execution.
//!
//! Constructed once in `main` after CLI parsing, before command dispatch.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use gastown_ops::RoutedOps;
use gastown_ops::bd_cli::BdRouter;
use gastown_routing::town;

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Resolved town root.
    pub town_root: PathBuf,

    /// Actor identity for hook mirrors and audit.
    pub actor: String,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

impl RuntimeContext {
    /// Builds a context from parsed global arguments.
    ///
    /// The town root resolves from `--town` / `GT_TOWN_ROOT`, else by
    /// walking up from the current directory looking for `mayor/rigs.json`.
    pub fn from_global_args(global: &GlobalArgs) -> Result<Self> {
        let town_root = match &global.town {
            Some(t) => PathBuf::from(t),
            None => {
                let cwd = env::current_dir().context("cannot read current directory")?;
                town::find_town_root_or_error(&cwd)?
            }
        };

        Ok(Self {
            town_root,
            actor: resolve_actor(global.actor.as_deref()),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        })
    }

    /// Opens a town-scoped router over the CLI binding.
    pub fn router(&self) -> Result<BdRouter> {
        Ok(BdRouter::open(&self.town_root)?)
    }

    /// Town-scoped ops over the CLI binding.
    pub fn ops(&self) -> Result<Arc<RoutedOps>> {
        Ok(Arc::new(self.router()?.ops()))
    }
}

/// Resolves the actor identity.
///
/// Priority: explicit flag > GT_ACTOR env > USER env > "unknown".
fn resolve_actor(flag_value: Option<&str>) -> String {
    if let Some(actor) = flag_value {
        if !actor.is_empty() {
            return actor.to_string();
        }
    }
    if let Ok(actor) = env::var("GT_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }
    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        if !user.is_empty() {
            return user;
        }
    }
    "unknown".to_string()
}
