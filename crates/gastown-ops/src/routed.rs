//! The routing layer shared by the real and fake store bindings.
//!
//! A [`StoreRouter`] knows which store directory (or in-memory rig) owns a
//! bead id and which rigs an instance can see. [`RoutedOps`] implements
//! the [`BeadsOps`] contract on top of any router, so the cross-rig
//! forwarding and readiness semantics are written exactly once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use gastown_core::bead::Bead;
use gastown_core::enums::Status;
use gastown_core::ids::is_town_level;

use crate::error::Result;
use crate::traits::{BeadPatch, BeadStore, BeadsOps};

/// Resolves bead ids to store handles.
///
/// A town-scoped router sees every rig; a rig-scoped router sees only its
/// own, but still forwards mutations cross-rig via [`StoreRouter::store_for`].
pub trait StoreRouter: Send + Sync {
    /// Store owning the bead id (town store for `hq-` ids).
    ///
    /// Unroutable prefixes are an [`crate::OpsError::InvalidArgument`].
    fn store_for(&self, bead_id: &str) -> Result<Arc<dyn BeadStore>>;

    /// The town-level store.
    fn town_store(&self) -> Arc<dyn BeadStore>;

    /// Rigs reachable from this instance as `(rig_name, store)`.
    ///
    /// The town store appears under the empty rig name on town-scoped
    /// routers.
    fn rigs(&self) -> Vec<(String, Arc<dyn BeadStore>)>;

    /// Rig name owning the bead id, or empty (never an error).
    fn rig_for_bead(&self, id: &str) -> String;

    /// `external:<project>:<id>` for routable rig beads, else `None`.
    fn external_ref(&self, id: &str) -> Option<String>;

    /// Working directory for CLI invocations against the bead, when the
    /// binding runs child processes.
    fn dir_for_bead(&self, id: &str) -> Option<PathBuf>;
}

/// [`BeadsOps`] implemented over any [`StoreRouter`].
#[derive(Clone)]
pub struct RoutedOps {
    router: Arc<dyn StoreRouter>,
}

impl RoutedOps {
    pub fn new(router: Arc<dyn StoreRouter>) -> Self {
        Self { router }
    }

    /// The router backing this instance.
    pub fn router(&self) -> &Arc<dyn StoreRouter> {
        &self.router
    }

    /// Status of a blocker id, resolved cross-rig; `None` when the blocker
    /// cannot be resolved at all.
    fn blocker_status(&self, id: &str) -> Option<Status> {
        let store = self.router.store_for(id).ok()?;
        let bead = store.show(id).ok()?;
        Some(bead.status)
    }
}

impl BeadsOps for RoutedOps {
    fn is_town_level(&self, id: &str) -> bool {
        is_town_level(id)
    }

    fn rig_for_bead(&self, id: &str) -> String {
        self.router.rig_for_bead(id)
    }

    fn label_add(&self, id: &str, label: &str) -> Result<()> {
        let store = self.router.store_for(id)?;
        store.update(
            id,
            &BeadPatch {
                add_label: Some(label.to_string()),
                ..Default::default()
            },
        )
    }

    fn label_remove(&self, id: &str, label: &str) -> Result<()> {
        let store = self.router.store_for(id)?;
        store.update(
            id,
            &BeadPatch {
                remove_label: Some(label.to_string()),
                ..Default::default()
            },
        )
    }

    fn list_ready_by_label(&self, label: &str) -> Result<HashMap<String, Vec<Bead>>> {
        let mut out: HashMap<String, Vec<Bead>> = HashMap::new();
        for (rig, store) in self.router.rigs() {
            let candidates = store.list_open_by_label(label)?;
            let ready: Vec<Bead> = candidates
                .into_iter()
                .filter(|b| b.is_ready_with(|blocker| self.blocker_status(blocker)))
                .collect();
            debug!(rig = %rig, count = ready.len(), label, "ready beads");
            if !ready.is_empty() {
                out.insert(rig, ready);
            }
        }
        Ok(out)
    }
}
