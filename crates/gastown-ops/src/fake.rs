//! In-memory store binding for tests.
//!
//! A [`FakeTown`] holds every rig's beads in one registry keyed by id;
//! scoping is by prefix, matching the directory-local semantics of the
//! real store. The fake honours the same conformance contract as the CLI
//! binding (see [`crate::conformance`]).

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use gastown_core::bead::Bead;
use gastown_core::enums::{DepType, Status};
use gastown_core::ids::{HQ_PREFIX, extract_prefix, mint_id};
use gastown_routing::routes::parse_external_ref;

use crate::error::{OpsError, Result};
use crate::routed::{RoutedOps, StoreRouter};
use crate::traits::{BeadPatch, BeadStore, BondReceipt, CreateSpec, WispReceipt};

/// A dependency edge as recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    from: String,
    /// Plain id or `external:<project>:<id>` reference.
    to: String,
    dep_type: DepType,
}

#[derive(Debug, Default)]
struct State {
    /// prefix (hyphen included) -> rig name.
    rigs: BTreeMap<String, String>,
    beads: BTreeMap<String, Bead>,
    edges: Vec<Edge>,
    cooked: BTreeSet<String>,
    fail_cooks: BTreeSet<String>,
    wisp_vars: Vec<(String, Vec<(String, String)>)>,
    bonds: Vec<(String, String)>,
    bond_root_override: Option<String>,
    nonce: i32,
}

/// The whole in-memory town: rigs, beads, edges, formula state.
#[derive(Default)]
pub struct FakeTown {
    state: Mutex<State>,
}

/// Store scope: the town store or one rig's store.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Town,
    Rig(String),
}

impl Scope {
    fn prefix(&self) -> &str {
        match self {
            Scope::Town => HQ_PREFIX,
            Scope::Rig(prefix) => prefix,
        }
    }
}

impl FakeTown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a rig under the given prefix (hyphen included).
    pub fn add_rig(&self, prefix: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.rigs.insert(prefix.to_string(), name.to_string());
    }

    /// Inserts a bead as-is, bypassing create semantics.
    pub fn seed(&self, bead: Bead) {
        let mut state = self.state.lock().unwrap();
        state.beads.insert(bead.id.clone(), bead);
    }

    /// Reads back a bead by id.
    pub fn get(&self, id: &str) -> Option<Bead> {
        self.state.lock().unwrap().beads.get(id).cloned()
    }

    /// Marks a formula as already cooked.
    pub fn set_cooked(&self, formula: &str) {
        self.state.lock().unwrap().cooked.insert(formula.to_string());
    }

    /// Makes cooking the given formula fail.
    pub fn fail_cook(&self, formula: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_cooks
            .insert(formula.to_string());
    }

    /// Returns the formulas cooked so far.
    pub fn cooked(&self) -> Vec<String> {
        self.state.lock().unwrap().cooked.iter().cloned().collect()
    }

    /// Variables passed to the most recent wisp instantiation.
    pub fn last_wisp_vars(&self) -> Option<(String, Vec<(String, String)>)> {
        self.state.lock().unwrap().wisp_vars.last().cloned()
    }

    /// Recorded (wisp, bead) bond pairs.
    pub fn bonds(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().bonds.clone()
    }

    /// Makes subsequent bonds report the given root id.
    pub fn set_bond_root(&self, root: &str) {
        self.state.lock().unwrap().bond_root_override = Some(root.to_string());
    }

    /// Dependency edges pointing at the given id (plain or external form).
    pub fn tracking_edges(&self, id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .edges
            .iter()
            .filter(|e| e.dep_type == DepType::Tracks && edge_targets(e, id))
            .map(|e| e.from.clone())
            .collect()
    }

    // -- Handles -------------------------------------------------------------

    /// The town-level store.
    pub fn town_store(self: &Arc<Self>) -> Arc<FakeStore> {
        Arc::new(FakeStore {
            town: Arc::clone(self),
            scope: Scope::Town,
        })
    }

    /// A rig-scoped store for the given prefix.
    pub fn rig_store(self: &Arc<Self>, prefix: &str) -> Arc<FakeStore> {
        Arc::new(FakeStore {
            town: Arc::clone(self),
            scope: Scope::Rig(prefix.to_string()),
        })
    }

    /// A town-scoped router.
    pub fn router(self: &Arc<Self>) -> Arc<FakeRouter> {
        Arc::new(FakeRouter {
            town: Arc::clone(self),
            scope: Scope::Town,
        })
    }

    /// A router scoped to one rig.
    pub fn rig_router(self: &Arc<Self>, prefix: &str) -> Arc<FakeRouter> {
        Arc::new(FakeRouter {
            town: Arc::clone(self),
            scope: Scope::Rig(prefix.to_string()),
        })
    }

    /// Town-scoped [`RoutedOps`].
    pub fn ops(self: &Arc<Self>) -> RoutedOps {
        RoutedOps::new(self.router())
    }

    /// Rig-scoped [`RoutedOps`].
    pub fn rig_ops(self: &Arc<Self>, prefix: &str) -> RoutedOps {
        RoutedOps::new(self.rig_router(prefix))
    }
}

fn edge_targets(edge: &Edge, id: &str) -> bool {
    edge.to == id
        || parse_external_ref(&edge.to).is_some_and(|(_, plain)| plain == id)
}

// ---------------------------------------------------------------------------
// FakeStore
// ---------------------------------------------------------------------------

/// One scope's view of the fake town, implementing [`BeadStore`].
pub struct FakeStore {
    town: Arc<FakeTown>,
    scope: Scope,
}

impl FakeStore {
    fn owns(&self, id: &str) -> bool {
        extract_prefix(id) == self.scope.prefix()
    }
}

impl BeadStore for FakeStore {
    fn create(&self, spec: &CreateSpec) -> Result<Bead> {
        let mut state = self.town.state.lock().unwrap();
        let id = match &spec.id {
            Some(id) => {
                if state.beads.contains_key(id) {
                    return Err(OpsError::conflict(format!("bead {id} already exists")));
                }
                id.clone()
            }
            None => {
                let prefix = self.scope.prefix().trim_end_matches('-').to_string();
                loop {
                    state.nonce += 1;
                    let id = mint_id(&prefix, &spec.title, "fake", Utc::now(), state.nonce);
                    if !state.beads.contains_key(&id) {
                        break id;
                    }
                }
            }
        };

        let mut labels = spec.labels.clone();
        labels.sort();
        labels.dedup();

        let bead = Bead {
            id: id.clone(),
            title: spec.title.clone(),
            description: spec.description.clone(),
            status: Status::Open,
            issue_type: spec.issue_type.clone(),
            priority: spec.priority.unwrap_or(2),
            assignee: spec.assignee.clone().unwrap_or_default(),
            labels,
            ..Default::default()
        };
        state.beads.insert(id, bead.clone());
        Ok(bead)
    }

    fn show(&self, id: &str) -> Result<Bead> {
        if !self.owns(id) {
            return Err(OpsError::not_found("bead", id));
        }
        let state = self.town.state.lock().unwrap();
        state
            .beads
            .get(id)
            .cloned()
            .ok_or_else(|| OpsError::not_found("bead", id))
    }

    fn list_open_by_label(&self, label: &str) -> Result<Vec<Bead>> {
        let state = self.town.state.lock().unwrap();
        Ok(state
            .beads
            .values()
            .filter(|b| {
                extract_prefix(&b.id) == self.scope.prefix()
                    && b.status == Status::Open
                    && b.has_label(label)
            })
            .cloned()
            .collect())
    }

    fn update(&self, id: &str, patch: &BeadPatch) -> Result<()> {
        if !self.owns(id) {
            return Err(OpsError::not_found("bead", id));
        }
        let mut state = self.town.state.lock().unwrap();
        let bead = state
            .beads
            .get_mut(id)
            .ok_or_else(|| OpsError::not_found("bead", id))?;

        if let Some(title) = &patch.title {
            bead.title = title.clone();
        }
        if let Some(description) = &patch.description {
            bead.description = description.clone();
        }
        if let Some(status) = &patch.status {
            bead.status = status.clone();
            match status {
                Status::Closed => bead.closed_at = Some(Utc::now()),
                Status::Open => bead.closed_at = None,
                _ => {}
            }
        }
        if let Some(assignee) = &patch.assignee {
            bead.assignee = assignee.clone();
        }
        if let Some(label) = &patch.add_label {
            if !bead.has_label(label) {
                bead.labels.push(label.clone());
            }
        }
        if let Some(label) = &patch.remove_label {
            bead.labels.retain(|l| l != label);
        }
        Ok(())
    }

    fn close(&self, id: &str, _reason: &str) -> Result<()> {
        self.update(id, &BeadPatch::status(Status::Closed))
    }

    fn dep_add(&self, from: &str, to: &str, dep_type: DepType) -> Result<()> {
        let mut state = self.town.state.lock().unwrap();
        if !state.beads.contains_key(from) {
            return Err(OpsError::not_found("bead", from));
        }
        let edge = Edge {
            from: from.to_string(),
            to: to.to_string(),
            dep_type: dep_type.clone(),
        };
        if state.edges.contains(&edge) {
            return Ok(()); // dep add is idempotent
        }

        if dep_type == DepType::Blocks {
            // `from` is blocked until `to` closes.
            if let Some(bead) = state.beads.get_mut(from) {
                if !bead.blocked_by.iter().any(|b| b == to) {
                    bead.blocked_by.push(to.to_string());
                }
            }
            if let Some(bead) = state.beads.get_mut(to) {
                if !bead.blocks.iter().any(|b| b == from) {
                    bead.blocks.push(from.to_string());
                }
            }
        }
        state.edges.push(edge);
        Ok(())
    }

    fn deps_up(&self, id: &str, dep_type: DepType) -> Result<Vec<Bead>> {
        // The dep ledger is town-global in the fake, matching the real
        // store's town-level edge table for tracks dependencies.
        let state = self.town.state.lock().unwrap();
        Ok(state
            .edges
            .iter()
            .filter(|e| e.dep_type == dep_type && edge_targets(e, id))
            .filter_map(|e| state.beads.get(&e.from).cloned())
            .collect())
    }

    fn cook_formula(&self, formula: &str) -> Result<()> {
        let mut state = self.town.state.lock().unwrap();
        if state.fail_cooks.contains(formula) {
            return Err(OpsError::store(format!("formula cook failed: {formula}")));
        }
        state.cooked.insert(formula.to_string());
        Ok(())
    }

    fn create_wisp(&self, formula: &str, vars: &[(String, String)]) -> Result<WispReceipt> {
        let mut state = self.town.state.lock().unwrap();
        if !state.cooked.contains(formula) {
            return Err(OpsError::not_found("formula", formula));
        }

        let prefix = format!("{}wisp", self.scope.prefix());
        state.nonce += 1;
        let id = mint_id(
            prefix.trim_end_matches('-'),
            formula,
            "fake",
            Utc::now(),
            state.nonce,
        );

        let feature = vars
            .iter()
            .find(|(k, _)| k == "feature")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| formula.to_string());
        let wisp = Bead {
            id: id.clone(),
            title: feature,
            issue_type: gastown_core::enums::BeadKind::Epic,
            ..Default::default()
        };
        state.beads.insert(id.clone(), wisp);
        state.wisp_vars.push((formula.to_string(), vars.to_vec()));

        Ok(WispReceipt {
            new_epic_id: Some(id),
            ..Default::default()
        })
    }

    fn bond(&self, wisp_id: &str, bead_id: &str) -> Result<BondReceipt> {
        let mut state = self.town.state.lock().unwrap();
        if !state.beads.contains_key(wisp_id) {
            return Err(OpsError::not_found("wisp", wisp_id));
        }
        let pair = (wisp_id.to_string(), bead_id.to_string());
        if !state.bonds.contains(&pair) {
            state.bonds.push(pair);
        }
        Ok(BondReceipt {
            root_id: state.bond_root_override.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeRouter
// ---------------------------------------------------------------------------

/// [`StoreRouter`] over a [`FakeTown`]: a prefix -> (rig, store) map.
pub struct FakeRouter {
    town: Arc<FakeTown>,
    scope: Scope,
}

impl StoreRouter for FakeRouter {
    fn store_for(&self, bead_id: &str) -> Result<Arc<dyn BeadStore>> {
        let prefix = extract_prefix(bead_id);
        if prefix.is_empty() {
            return Err(OpsError::invalid_argument(format!(
                "bead id {bead_id:?} has no prefix"
            )));
        }
        if prefix == HQ_PREFIX {
            return Ok(self.town.town_store());
        }
        let state = self.town.state.lock().unwrap();
        if !state.rigs.contains_key(prefix) {
            return Err(OpsError::invalid_argument(format!(
                "no route for prefix {prefix}"
            )));
        }
        drop(state);
        Ok(self.town.rig_store(prefix))
    }

    fn town_store(&self) -> Arc<dyn BeadStore> {
        self.town.town_store()
    }

    fn rigs(&self) -> Vec<(String, Arc<dyn BeadStore>)> {
        match &self.scope {
            Scope::Town => {
                let state = self.town.state.lock().unwrap();
                let rigs: Vec<(String, String)> = state
                    .rigs
                    .iter()
                    .map(|(p, n)| (p.clone(), n.clone()))
                    .collect();
                drop(state);

                let mut out: Vec<(String, Arc<dyn BeadStore>)> =
                    vec![(String::new(), self.town.town_store())];
                for (prefix, name) in rigs {
                    out.push((name, self.town.rig_store(&prefix)));
                }
                out
            }
            Scope::Rig(prefix) => {
                let name = self.rig_name(prefix);
                vec![(name, self.town.rig_store(prefix))]
            }
        }
    }

    fn rig_for_bead(&self, id: &str) -> String {
        let prefix = extract_prefix(id);
        if prefix.is_empty() || prefix == HQ_PREFIX {
            return String::new();
        }
        self.rig_name(prefix)
    }

    fn external_ref(&self, id: &str) -> Option<String> {
        let prefix = extract_prefix(id);
        if prefix.is_empty() || prefix == HQ_PREFIX {
            return None;
        }
        let name = self.rig_name(prefix);
        if name.is_empty() {
            return None;
        }
        Some(format!("external:{name}:{id}"))
    }

    fn dir_for_bead(&self, _id: &str) -> Option<PathBuf> {
        None
    }
}

impl FakeRouter {
    fn rig_name(&self, prefix: &str) -> String {
        self.town
            .state
            .lock()
            .unwrap()
            .rigs
            .get(prefix)
            .cloned()
            .unwrap_or_default()
    }
}
