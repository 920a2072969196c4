//! The town route table: bead-id prefix to rig store path.
//!
//! Routes live in `<townRoot>/.beads/routes.jsonl`, one JSON object per
//! line. When a beads daemon is running it is the fresher source: route
//! beads queried from it supersede the file, falling back to the file when
//! the daemon errors or returns nothing.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use gastown_core::bead::Bead;
use gastown_core::ids::{HQ_PREFIX, extract_prefix, is_town_level};
use gastown_core::jsonl;

use crate::error::Result;

/// Name of the route table file under the town's `.beads` directory.
pub const ROUTES_FILE: &str = "routes.jsonl";

/// A single prefix-to-path record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Bead-id prefix, hyphen included (`"gt-"`).
    pub prefix: String,
    /// Rig store path relative to the town root; `"."` for the town store.
    pub path: String,
}

/// Supplies route beads from a live daemon.
///
/// Implementations query whatever transport they have and return the raw
/// beads; parsing into [`Route`]s happens here so every source shares the
/// label/title fallback rules.
pub trait RouteSource {
    /// Returns the current route beads, or an error if the source is down.
    fn route_beads(&self) -> Result<Vec<Bead>>;
}

/// The loaded route table for one town.
#[derive(Debug, Clone)]
pub struct RouteTable {
    town_root: PathBuf,
    routes: Vec<Route>,
}

impl RouteTable {
    /// Builds a table from explicit routes (tests, fakes).
    pub fn new(town_root: impl Into<PathBuf>, routes: Vec<Route>) -> Self {
        Self {
            town_root: town_root.into(),
            routes,
        }
    }

    /// Loads the table from `<townRoot>/.beads/routes.jsonl`.
    ///
    /// A missing file yields an empty table; malformed lines are skipped.
    pub fn load(town_root: impl Into<PathBuf>) -> Result<Self> {
        let town_root = town_root.into();
        let routes = read_routes_file(&town_root)?;
        Ok(Self { town_root, routes })
    }

    /// Loads the table, preferring a daemon source over the file.
    ///
    /// Daemon results supersede the file wholesale; an erroring or empty
    /// daemon falls back to the on-disk table.
    pub fn load_with_source(
        town_root: impl Into<PathBuf>,
        source: Option<&dyn RouteSource>,
    ) -> Result<Self> {
        let town_root = town_root.into();
        if let Some(source) = source {
            match source.route_beads() {
                Ok(beads) => {
                    let routes = routes_from_beads(&beads);
                    if !routes.is_empty() {
                        return Ok(Self { town_root, routes });
                    }
                    debug!("daemon returned no routes, falling back to file");
                }
                Err(e) => {
                    debug!(error = %e, "daemon route query failed, falling back to file");
                }
            }
        }
        let routes = read_routes_file(&town_root)?;
        Ok(Self { town_root, routes })
    }

    /// Returns the loaded routes.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the town root this table resolves against.
    pub fn town_root(&self) -> &Path {
        &self.town_root
    }

    /// Returns the first route claiming the given prefix.
    pub fn route_for_prefix(&self, prefix: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.prefix == prefix)
    }

    /// Returns the rig name owning a bead id, or empty.
    ///
    /// The rig name is the first path component of the route's path. Town
    /// beads (`hq-`) have no rig by design; an unknown prefix yields empty
    /// as well, never an error.
    pub fn rig_for_bead(&self, id: &str) -> String {
        let prefix = extract_prefix(id);
        if prefix.is_empty() || prefix == HQ_PREFIX {
            return String::new();
        }
        match self.route_for_prefix(prefix) {
            Some(route) => rig_of_path(&route.path).to_string(),
            None => String::new(),
        }
    }

    /// Returns the absolute store directory for a prefix.
    ///
    /// The town-level route (path `"."`) resolves to the town root itself.
    pub fn path_for_prefix(&self, prefix: &str) -> Option<PathBuf> {
        let route = self.route_for_prefix(prefix)?;
        if route.path == "." {
            Some(self.town_root.clone())
        } else {
            Some(self.town_root.join(&route.path))
        }
    }

    /// Returns the working directory for store operations on a bead id.
    ///
    /// Town beads resolve to the town root; unroutable ids yield `None`.
    pub fn dir_for_bead(&self, id: &str) -> Option<PathBuf> {
        let prefix = extract_prefix(id);
        if prefix.is_empty() {
            return None;
        }
        if prefix == HQ_PREFIX {
            return Some(self.town_root.clone());
        }
        self.path_for_prefix(prefix)
    }

    /// Produces an `external:<project>:<id>` reference for a rig bead.
    ///
    /// Town-level ids and unroutable ids yield `None`; the caller decides
    /// whether that is an error.
    pub fn resolve_to_external_ref(&self, id: &str) -> Option<String> {
        if is_town_level(id) {
            return None;
        }
        let prefix = extract_prefix(id);
        if prefix.is_empty() {
            return None;
        }
        let route = self.route_for_prefix(prefix)?;
        let project = rig_of_path(&route.path);
        if project.is_empty() {
            return None;
        }
        Some(format!("external:{project}:{id}"))
    }

    /// Returns every prefix claimed by more than one route, with the
    /// claiming paths. Conflicts are diagnostics, not errors.
    pub fn find_conflicts(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_prefix: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for route in &self.routes {
            by_prefix
                .entry(route.prefix.clone())
                .or_default()
                .push(route.path.clone());
        }
        by_prefix.retain(|_, paths| paths.len() > 1);
        by_prefix
    }

    /// Enumerates `(rig_name, store_dir)` for every non-town route.
    pub fn rig_dirs(&self) -> Vec<(String, PathBuf)> {
        self.routes
            .iter()
            .filter(|r| r.path != "." && r.prefix != HQ_PREFIX)
            .filter_map(|r| {
                let rig = rig_of_path(&r.path);
                if rig.is_empty() {
                    return None;
                }
                Some((rig.to_string(), self.town_root.join(&r.path)))
            })
            .collect()
    }
}

/// First path component of a route path; empty for `"."`.
fn rig_of_path(path: &str) -> &str {
    if path == "." {
        return "";
    }
    path.split('/').next().unwrap_or("")
}

fn read_routes_file(town_root: &Path) -> Result<Vec<Route>> {
    let path = town_root.join(".beads").join(ROUTES_FILE);
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    // Malformed lines are skipped; the table is best-effort by contract.
    let routes = jsonl::read_jsonl::<_, Route>(BufReader::new(file))
        .filter_map(|r| r.ok())
        .filter(|r| !r.prefix.is_empty() && !r.path.is_empty())
        .collect();
    Ok(routes)
}

/// Parses route beads returned by a daemon query.
///
/// Each bead carries `prefix:<p>` and `path:<p>` labels; beads missing the
/// labels fall back to a `"<prefix> → <path>"` title. Beads that parse to
/// neither shape are skipped.
pub fn routes_from_beads(beads: &[Bead]) -> Vec<Route> {
    beads.iter().filter_map(route_from_bead).collect()
}

fn route_from_bead(bead: &Bead) -> Option<Route> {
    let mut prefix = None;
    let mut path = None;
    for label in &bead.labels {
        if let Some(p) = label.strip_prefix("prefix:") {
            prefix = Some(p.to_string());
        } else if let Some(p) = label.strip_prefix("path:") {
            path = Some(p.to_string());
        }
    }
    if let (Some(prefix), Some(path)) = (prefix, path) {
        if !prefix.is_empty() && !path.is_empty() {
            return Some(Route { prefix, path });
        }
    }
    // Title fallback: "gt- → gastown/mayor/rig".
    let (prefix, path) = bead
        .title
        .split_once(" → ")
        .or_else(|| bead.title.split_once(" -> "))?;
    let (prefix, path) = (prefix.trim(), path.trim());
    if prefix.is_empty() || path.is_empty() {
        return None;
    }
    Some(Route {
        prefix: prefix.to_string(),
        path: path.to_string(),
    })
}

/// Splits an `external:<project>:<id>` reference.
pub fn parse_external_ref(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix("external:")?;
    let (project, id) = rest.split_once(':')?;
    if project.is_empty() || id.is_empty() {
        return None;
    }
    Some((project, id))
}
