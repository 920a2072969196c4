//! Store traits -- the seams between the dispatch core and the foreign
//! issue store.
//!
//! Consumers depend on these traits rather than on concrete bindings so
//! the in-memory fake and the process-exec CLI binding are substitutable.

use std::collections::HashMap;

use gastown_core::bead::Bead;
use gastown_core::enums::{BeadKind, DepType, Status};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Request / receipt types
// ---------------------------------------------------------------------------

/// Parameters for creating a bead.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
    pub title: String,
    pub issue_type: BeadKind,
    pub description: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub priority: Option<i32>,
    /// Explicit id. Ids with a hyphen in the suffix need the store's
    /// force flag because its own prefix inference would reject them.
    pub id: Option<String>,
}

impl CreateSpec {
    /// Creates a spec with the given title and kind.
    pub fn new(title: impl Into<String>, issue_type: BeadKind) -> Self {
        Self {
            title: title.into(),
            issue_type,
            ..Default::default()
        }
    }
}

/// Typed partial update for a bead.
///
/// Only `Some` fields are applied; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BeadPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub assignee: Option<String>,
    pub add_label: Option<String>,
    pub remove_label: Option<String>,
}

impl BeadPatch {
    /// A patch that only sets the status.
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// A patch that only rewrites the description.
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }
}

/// Parsed response of a wisp instantiation.
///
/// The store reports the new root under one of several keys depending on
/// version; [`WispReceipt::root`] picks the first present.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct WispReceipt {
    #[serde(default)]
    pub new_epic_id: Option<String>,
    #[serde(default)]
    pub root_id: Option<String>,
    #[serde(default)]
    pub result_id: Option<String>,
}

impl WispReceipt {
    /// First-present of `new_epic_id`, `root_id`, `result_id`.
    pub fn root(&self) -> Option<&str> {
        [&self.new_epic_id, &self.root_id, &self.result_id]
            .into_iter()
            .find_map(|v| v.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Parsed response of a bond operation.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BondReceipt {
    /// Set when bonding re-rooted the compound.
    #[serde(default)]
    pub root_id: Option<String>,
}

// ---------------------------------------------------------------------------
// BeadStore: the directory-scoped store contract
// ---------------------------------------------------------------------------

/// The foreign issue store, scoped to one store directory.
///
/// Listing is directory-local by the store's own semantics; cross-rig
/// traversal happens a layer up, in [`BeadsOps`].
pub trait BeadStore: Send + Sync {
    /// Creates a bead and returns it as stored.
    fn create(&self, spec: &CreateSpec) -> Result<Bead>;

    /// Fetches one bead with labels and dependency lists.
    fn show(&self, id: &str) -> Result<Bead>;

    /// Lists open beads carrying the given label, this store only.
    fn list_open_by_label(&self, label: &str) -> Result<Vec<Bead>>;

    /// Applies a partial update.
    fn update(&self, id: &str, patch: &BeadPatch) -> Result<()>;

    /// Closes a bead with a reason.
    fn close(&self, id: &str, reason: &str) -> Result<()>;

    /// Adds a dependency edge: `from` depends on / tracks `to`.
    ///
    /// `to` may be an `external:<project>:<id>` reference.
    fn dep_add(&self, from: &str, to: &str, dep_type: DepType) -> Result<()>;

    /// Lists beads that point at `id` through an edge of the given type.
    ///
    /// `id` may be an external reference; matching is by either form.
    fn deps_up(&self, id: &str, dep_type: DepType) -> Result<Vec<Bead>>;

    /// Ensures a formula's proto exists (cooks it if necessary).
    fn cook_formula(&self, formula: &str) -> Result<()>;

    /// Instantiates a wisp from a formula with the given variables.
    fn create_wisp(&self, formula: &str, vars: &[(String, String)]) -> Result<WispReceipt>;

    /// Bonds a wisp to a bead. Idempotent per (wisp, bead).
    fn bond(&self, wisp_id: &str, bead_id: &str) -> Result<BondReceipt>;
}

// ---------------------------------------------------------------------------
// BeadsOps: the routing-aware capability surface
// ---------------------------------------------------------------------------

/// The five-operation seam the queue and dispatcher consume.
///
/// Mutations route to the owning rig's store by prefix; only
/// [`BeadsOps::list_ready_by_label`] fans in across every rig reachable
/// from the instance.
pub trait BeadsOps: Send + Sync {
    /// Returns `true` iff the id names a town-level bead.
    fn is_town_level(&self, id: &str) -> bool;

    /// Returns the rig owning the bead id, or empty (never an error).
    fn rig_for_bead(&self, id: &str) -> String;

    /// Adds a label; adding an existing label is a no-op success.
    fn label_add(&self, id: &str, label: &str) -> Result<()>;

    /// Removes a label; removing an absent label is a no-op success.
    fn label_remove(&self, id: &str, label: &str) -> Result<()>;

    /// Returns, per reachable rig, the open beads carrying `label` whose
    /// blockers are all closed. Rigs with no matches are omitted.
    fn list_ready_by_label(&self, label: &str) -> Result<HashMap<String, Vec<Bead>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wisp_receipt_first_present_wins() {
        let r: WispReceipt = serde_json::from_str(
            r#"{"new_epic_id":"gt-wisp-1","root_id":"gt-wisp-2"}"#,
        )
        .unwrap();
        assert_eq!(r.root(), Some("gt-wisp-1"));

        let r: WispReceipt = serde_json::from_str(r#"{"result_id":"gt-wisp-3"}"#).unwrap();
        assert_eq!(r.root(), Some("gt-wisp-3"));

        let r: WispReceipt = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(r.root(), None);
    }

    #[test]
    fn wisp_receipt_ignores_empty_strings() {
        let r: WispReceipt =
            serde_json::from_str(r#"{"new_epic_id":"","root_id":"gt-wisp-2"}"#).unwrap();
        // Empty first key falls through to the next.
        assert_eq!(r.root(), Some("gt-wisp-2"));
    }

    #[test]
    fn patch_helpers() {
        let p = BeadPatch::status(Status::Hooked);
        assert_eq!(p.status, Some(Status::Hooked));
        assert!(p.description.is_none());
    }
}
