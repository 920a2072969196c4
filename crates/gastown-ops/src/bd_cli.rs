//! Process-exec binding over the foreign `bd` CLI.
//!
//! Every invocation runs with the working directory chosen through the
//! route table, because the CLI's own routing is directory-sensitive.
//! Daemon routing is forced off per process; daemon-pointing environment
//! variables are stripped from every child.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use gastown_core::bead::Bead;
use gastown_core::enums::DepType;
use gastown_core::ids::extract_prefix;
use gastown_routing::routes::{RouteSource, RouteTable};
use gastown_routing::runtime;
use gastown_routing::{Result as RoutingResult, RoutingError};

use crate::error::{OpsError, Result};
use crate::routed::{RoutedOps, StoreRouter};
use crate::traits::{BeadPatch, BeadStore, BondReceipt, CreateSpec, WispReceipt};

/// Default name of the foreign CLI binary.
pub const DEFAULT_BIN: &str = "bd";

/// Label identifying route beads in the town store.
pub const ROUTE_LABEL: &str = "route";

// ---------------------------------------------------------------------------
// BdStore
// ---------------------------------------------------------------------------

/// A directory-scoped [`BeadStore`] that shells out to the `bd` CLI.
pub struct BdStore {
    dir: PathBuf,
    bin: String,
}

impl BdStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_binary(dir, DEFAULT_BIN)
    }

    pub fn with_binary(dir: impl Into<PathBuf>, bin: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            bin: bin.into(),
        }
    }

    /// The store directory this handle operates in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn run(&self, args: &[String]) -> Result<String> {
        runtime::force_local_routing();
        debug!(dir = %self.dir.display(), ?args, "bd invocation");

        let output = Command::new(&self.bin)
            .args(args)
            .current_dir(&self.dir)
            .env(runtime::ROUTING_MODE_ENV, "local")
            .env_remove(runtime::DAEMON_MODE_ENV)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OpsError::unavailable(format!("{} binary not found", self.bin))
                } else {
                    OpsError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(&stderr, args));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> Result<T> {
        let stdout = self.run(args)?;
        Ok(serde_json::from_str(stdout.trim())?)
    }
}

/// Maps a non-zero CLI exit onto the error taxonomy.
fn classify_failure(stderr: &str, args: &[String]) -> OpsError {
    let lower = stderr.to_lowercase();
    if lower.contains("not found") || lower.contains("no such issue") {
        let id = args
            .iter()
            .find(|a| !a.starts_with("--") && a.contains('-'))
            .cloned()
            .unwrap_or_default();
        return OpsError::not_found("bead", id);
    }
    if lower.contains("connection refused") || lower.contains("daemon") {
        return OpsError::unavailable(stderr.to_string());
    }
    OpsError::store(stderr.to_string())
}

/// Returns `true` when an explicit id needs the CLI's `--force` flag.
///
/// The CLI's own prefix inference rejects ids whose suffix contains a
/// hyphen (`hq-cv-abc`), so those are created with force.
fn needs_force(id: &str) -> bool {
    let prefix = extract_prefix(id);
    !prefix.is_empty() && id[prefix.len()..].contains('-')
}

fn create_args(spec: &CreateSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        spec.title.clone(),
        "--type".to_string(),
        spec.issue_type.to_string(),
        "--json".to_string(),
    ];
    if !spec.description.is_empty() {
        args.push("--description".to_string());
        args.push(spec.description.clone());
    }
    if let Some(assignee) = &spec.assignee {
        args.push("--assignee".to_string());
        args.push(assignee.clone());
    }
    if let Some(priority) = spec.priority {
        args.push("--priority".to_string());
        args.push(priority.to_string());
    }
    for label in &spec.labels {
        args.push("--label".to_string());
        args.push(label.clone());
    }
    if let Some(id) = &spec.id {
        args.push("--id".to_string());
        args.push(id.clone());
        if needs_force(id) {
            args.push("--force".to_string());
        }
    }
    args
}

fn update_args(id: &str, patch: &BeadPatch) -> Vec<String> {
    let mut args = vec!["update".to_string(), id.to_string()];
    if let Some(title) = &patch.title {
        args.push("--title".to_string());
        args.push(title.clone());
    }
    if let Some(description) = &patch.description {
        args.push("--description".to_string());
        args.push(description.clone());
    }
    if let Some(status) = &patch.status {
        args.push("--status".to_string());
        args.push(status.to_string());
    }
    if let Some(assignee) = &patch.assignee {
        args.push("--assignee".to_string());
        args.push(assignee.clone());
    }
    if let Some(label) = &patch.add_label {
        args.push("--add-label".to_string());
        args.push(label.clone());
    }
    if let Some(label) = &patch.remove_label {
        args.push("--remove-label".to_string());
        args.push(label.clone());
    }
    args
}

impl BeadStore for BdStore {
    fn create(&self, spec: &CreateSpec) -> Result<Bead> {
        self.run_json(&create_args(spec))
    }

    fn show(&self, id: &str) -> Result<Bead> {
        let stdout = self.run(&[
            "show".to_string(),
            id.to_string(),
            "--json".to_string(),
        ])?;
        // `show --json` prints a single-element array on current store
        // versions and a bare object on older ones.
        let value: serde_json::Value = serde_json::from_str(stdout.trim())?;
        let bead = match value {
            serde_json::Value::Array(arr) => arr
                .into_iter()
                .next()
                .ok_or_else(|| OpsError::not_found("bead", id))?,
            other => other,
        };
        Ok(serde_json::from_value(bead)?)
    }

    fn list_open_by_label(&self, label: &str) -> Result<Vec<Bead>> {
        self.run_json(&[
            "list".to_string(),
            "--status".to_string(),
            "open".to_string(),
            "--label".to_string(),
            label.to_string(),
            "--json".to_string(),
        ])
    }

    fn update(&self, id: &str, patch: &BeadPatch) -> Result<()> {
        let args = update_args(id, patch);
        if args.len() == 2 {
            return Ok(()); // empty patch
        }
        self.run(&args).map(|_| ())
    }

    fn close(&self, id: &str, reason: &str) -> Result<()> {
        self.run(&[
            "close".to_string(),
            id.to_string(),
            "--reason".to_string(),
            reason.to_string(),
        ])
        .map(|_| ())
    }

    fn dep_add(&self, from: &str, to: &str, dep_type: DepType) -> Result<()> {
        self.run(&[
            "dep".to_string(),
            "add".to_string(),
            from.to_string(),
            to.to_string(),
            "--type".to_string(),
            dep_type.to_string(),
        ])
        .map(|_| ())
    }

    fn deps_up(&self, id: &str, dep_type: DepType) -> Result<Vec<Bead>> {
        self.run_json(&[
            "dep".to_string(),
            "list".to_string(),
            id.to_string(),
            "--direction".to_string(),
            "up".to_string(),
            "--type".to_string(),
            dep_type.to_string(),
            "--json".to_string(),
        ])
    }

    fn cook_formula(&self, formula: &str) -> Result<()> {
        self.run(&[
            "formula".to_string(),
            "cook".to_string(),
            formula.to_string(),
        ])
        .map(|_| ())
    }

    fn create_wisp(&self, formula: &str, vars: &[(String, String)]) -> Result<WispReceipt> {
        let mut args = vec![
            "mol".to_string(),
            "wisp".to_string(),
            formula.to_string(),
            "--json".to_string(),
        ];
        for (key, value) in vars {
            args.push("--var".to_string());
            args.push(format!("{key}={value}"));
        }
        self.run_json(&args)
    }

    fn bond(&self, wisp_id: &str, bead_id: &str) -> Result<BondReceipt> {
        let stdout = self.run(&[
            "mol".to_string(),
            "bond".to_string(),
            wisp_id.to_string(),
            bead_id.to_string(),
            "--json".to_string(),
        ])?;
        // Older store versions print a bare confirmation instead of JSON.
        Ok(serde_json::from_str(stdout.trim()).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Route source over the CLI
// ---------------------------------------------------------------------------

/// Queries route beads from the store (daemon-fresh when one is running).
pub struct CliRouteSource {
    store: BdStore,
}

impl CliRouteSource {
    pub fn new(town_root: impl Into<PathBuf>) -> Self {
        Self {
            store: BdStore::new(town_root),
        }
    }
}

impl RouteSource for CliRouteSource {
    fn route_beads(&self) -> RoutingResult<Vec<Bead>> {
        self.store
            .list_open_by_label(ROUTE_LABEL)
            .map_err(|e| RoutingError::Unavailable(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// BdRouter
// ---------------------------------------------------------------------------

/// Scope of a [`BdRouter`]: the whole town or one rig.
#[derive(Debug, Clone)]
enum RouterScope {
    Town,
    Rig { name: String, dir: PathBuf },
}

/// [`StoreRouter`] backed by the route table and per-directory [`BdStore`]s.
#[derive(Clone)]
pub struct BdRouter {
    town_root: PathBuf,
    table: RouteTable,
    scope: RouterScope,
    bin: String,
}

impl BdRouter {
    /// Opens a town-scoped router, loading the route table.
    ///
    /// With a daemon running, its route beads supersede `routes.jsonl`.
    pub fn open(town_root: impl Into<PathBuf>) -> Result<Self> {
        runtime::force_local_routing();
        let town_root = town_root.into();
        let table = if runtime::is_daemon_mode() {
            let source = CliRouteSource::new(&town_root);
            RouteTable::load_with_source(&town_root, Some(&source))?
        } else {
            RouteTable::load(&town_root)?
        };
        Ok(Self {
            town_root,
            table,
            scope: RouterScope::Town,
            bin: DEFAULT_BIN.to_string(),
        })
    }

    /// Overrides the CLI binary name (tests point this at a stub).
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    /// Narrows to one rig: listings see only that rig, mutations still
    /// forward cross-rig.
    pub fn rig_scoped(&self, rig_name: &str) -> Result<Self> {
        let (_, dir) = self
            .table
            .rig_dirs()
            .into_iter()
            .find(|(name, _)| name == rig_name)
            .ok_or_else(|| {
                OpsError::invalid_argument(format!("unknown rig {rig_name:?}"))
            })?;
        Ok(Self {
            town_root: self.town_root.clone(),
            table: self.table.clone(),
            scope: RouterScope::Rig {
                name: rig_name.to_string(),
                dir,
            },
            bin: self.bin.clone(),
        })
    }

    /// The loaded route table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Town-scoped [`RoutedOps`] over this router.
    pub fn ops(self) -> RoutedOps {
        RoutedOps::new(Arc::new(self))
    }

    fn store_at(&self, dir: PathBuf) -> Arc<dyn BeadStore> {
        Arc::new(BdStore::with_binary(dir, self.bin.clone()))
    }
}

impl StoreRouter for BdRouter {
    fn store_for(&self, bead_id: &str) -> Result<Arc<dyn BeadStore>> {
        let prefix = extract_prefix(bead_id);
        if prefix.is_empty() {
            return Err(OpsError::invalid_argument(format!(
                "bead id {bead_id:?} has no prefix"
            )));
        }
        match self.table.dir_for_bead(bead_id) {
            Some(dir) => Ok(self.store_at(dir)),
            None => Err(OpsError::invalid_argument(format!(
                "no route for prefix {prefix}"
            ))),
        }
    }

    fn town_store(&self) -> Arc<dyn BeadStore> {
        self.store_at(self.town_root.clone())
    }

    fn rigs(&self) -> Vec<(String, Arc<dyn BeadStore>)> {
        match &self.scope {
            RouterScope::Town => {
                let mut out: Vec<(String, Arc<dyn BeadStore>)> =
                    vec![(String::new(), self.town_store())];
                for (name, dir) in self.table.rig_dirs() {
                    out.push((name, self.store_at(dir)));
                }
                out
            }
            RouterScope::Rig { name, dir } => {
                vec![(name.clone(), self.store_at(dir.clone()))]
            }
        }
    }

    fn rig_for_bead(&self, id: &str) -> String {
        self.table.rig_for_bead(id)
    }

    fn external_ref(&self, id: &str) -> Option<String> {
        self.table.resolve_to_external_ref(id)
    }

    fn dir_for_bead(&self, id: &str) -> Option<PathBuf> {
        self.table.dir_for_bead(id)
    }
}
