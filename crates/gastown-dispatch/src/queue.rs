//! The ready-queue projection over the `queued` label.
//!
//! The store is the source of truth; the queue holds the snapshot of the
//! last `load()`. Blocked and closed beads never appear, and iteration
//! order across rigs is deliberately unspecified.

use std::sync::Arc;

use tracing::debug;

use gastown_ops::{BeadsOps, OpsError, Result};

/// The label that places an open, unblocked bead in the queue.
pub const QUEUE_LABEL: &str = "queued";

/// A non-owning projection of one queued bead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub bead_id: String,
    pub title: String,
    pub rig_name: String,
}

/// The label-driven ready-queue over a [`BeadsOps`] instance.
pub struct Queue {
    ops: Arc<dyn BeadsOps>,
    items: Vec<QueueItem>,
}

impl Queue {
    pub fn new(ops: Arc<dyn BeadsOps>) -> Self {
        Self {
            ops,
            items: Vec::new(),
        }
    }

    /// Queues a bead by applying the queue label.
    ///
    /// Town-level beads are rejected (polecats are rig-local), as are ids
    /// with no routable prefix. Re-queueing an already-queued bead is a
    /// no-op success.
    pub fn add(&self, bead_id: &str) -> Result<()> {
        if self.ops.is_town_level(bead_id) {
            return Err(OpsError::invalid_argument(format!(
                "{bead_id} is town-level; only rig beads are dispatchable"
            )));
        }
        if self.ops.rig_for_bead(bead_id).is_empty() {
            return Err(OpsError::invalid_argument(format!(
                "{bead_id} has no routable prefix"
            )));
        }
        self.ops.label_add(bead_id, QUEUE_LABEL)
    }

    /// Materialises queue items from every reachable rig.
    ///
    /// Only open beads whose blockers are all closed appear.
    pub fn load(&mut self) -> Result<&[QueueItem]> {
        let by_rig = self.ops.list_ready_by_label(QUEUE_LABEL)?;
        self.items = by_rig
            .into_iter()
            .flat_map(|(rig, beads)| {
                beads.into_iter().map(move |b| QueueItem {
                    bead_id: b.id,
                    title: b.title,
                    rig_name: rig.clone(),
                })
            })
            .collect();
        debug!(count = self.items.len(), "queue loaded");
        Ok(&self.items)
    }

    /// Removes a bead from the queue, routing cross-rig as needed.
    pub fn remove(&mut self, bead_id: &str) -> Result<()> {
        self.ops.label_remove(bead_id, QUEUE_LABEL)?;
        self.items.retain(|i| i.bead_id != bead_id);
        Ok(())
    }

    /// Empties the queue, best-effort.
    ///
    /// Individual removal failures do not abort the sweep; when any occur
    /// the aggregate is reported as a partial error carrying the count of
    /// successful removals.
    pub fn clear(&mut self) -> Result<usize> {
        self.load()?;
        let items = std::mem::take(&mut self.items);
        let mut removed = 0usize;
        let mut errors = Vec::new();
        for item in items {
            match self.ops.label_remove(&item.bead_id, QUEUE_LABEL) {
                Ok(()) => removed += 1,
                Err(e) => errors.push(format!("{}: {e}", item.bead_id)),
            }
        }
        if errors.is_empty() {
            Ok(removed)
        } else {
            Err(OpsError::Partial {
                succeeded: removed,
                errors,
            })
        }
    }

    /// Items from the last `load()` snapshot.
    pub fn all(&self) -> &[QueueItem] {
        &self.items
    }

    /// Number of items in the last `load()` snapshot.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the last snapshot was empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gastown_core::bead::BeadBuilder;
    use gastown_ops::fake::FakeTown;
    use gastown_ops::BeadStore;
    use pretty_assertions::assert_eq;

    fn sorted_ids(items: &[QueueItem]) -> Vec<&str> {
        let mut ids: Vec<&str> = items.iter().map(|i| i.bead_id.as_str()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn add_then_load_single_rig() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.seed(BeadBuilder::new("Fix pumps").id("gt-abc").build());

        let mut queue = Queue::new(Arc::new(town.ops()));
        queue.add("gt-abc").unwrap();

        let items = queue.load().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].bead_id, "gt-abc");
        assert_eq!(items[0].rig_name, "gastown");
        assert_eq!(items[0].title, "Fix pumps");
    }

    #[test]
    fn add_rejects_town_level_and_unroutable() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        let queue = Queue::new(Arc::new(town.ops()));

        assert!(queue.add("hq-1").is_err());
        assert!(queue.add("zz-1").is_err());
        assert!(queue.add("nohyphen").is_err());
    }

    #[test]
    fn add_is_idempotent() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.seed(BeadBuilder::new("x").id("gt-a").build());

        let mut queue = Queue::new(Arc::new(town.ops()));
        queue.add("gt-a").unwrap();
        queue.add("gt-a").unwrap();

        queue.load().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(
            town.get("gt-a")
                .unwrap()
                .labels
                .iter()
                .filter(|l| *l == QUEUE_LABEL)
                .count(),
            1
        );
    }

    #[test]
    fn cross_rig_fan_in() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.add_rig("gp-", "greenplace");
        town.seed(BeadBuilder::new("a").id("gt-abc").label(QUEUE_LABEL).build());
        town.seed(BeadBuilder::new("b").id("gp-xyz").label(QUEUE_LABEL).build());

        let mut queue = Queue::new(Arc::new(town.ops()));
        let items = queue.load().unwrap().to_vec();

        assert_eq!(items.len(), 2);
        assert_eq!(sorted_ids(&items), vec!["gp-xyz", "gt-abc"]);
        let rig_of = |id: &str| {
            items
                .iter()
                .find(|i| i.bead_id == id)
                .map(|i| i.rig_name.clone())
                .unwrap()
        };
        assert_eq!(rig_of("gt-abc"), "gastown");
        assert_eq!(rig_of("gp-xyz"), "greenplace");
    }

    #[test]
    fn blocked_beads_excluded_until_blocker_closes() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.seed(
            BeadBuilder::new("a")
                .id("gt-a")
                .label(QUEUE_LABEL)
                .blocked_by(vec!["gt-b".into()])
                .build(),
        );
        town.seed(BeadBuilder::new("b").id("gt-b").build());

        let mut queue = Queue::new(Arc::new(town.ops()));
        assert!(queue.load().unwrap().is_empty());

        town.rig_store("gt-").close("gt-b", "done").unwrap();
        let items = queue.load().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].bead_id, "gt-a");
    }

    #[test]
    fn remove_routes_cross_rig() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.add_rig("gp-", "greenplace");
        town.seed(BeadBuilder::new("b").id("gp-xyz").label(QUEUE_LABEL).build());

        // A gastown-scoped queue still removes the greenplace label.
        let mut queue = Queue::new(Arc::new(town.rig_ops("gt-")));
        queue.remove("gp-xyz").unwrap();
        assert!(!town.get("gp-xyz").unwrap().has_label(QUEUE_LABEL));
    }

    #[test]
    fn clear_reports_removed_count() {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.seed(BeadBuilder::new("a").id("gt-a").label(QUEUE_LABEL).build());
        town.seed(BeadBuilder::new("b").id("gt-b").label(QUEUE_LABEL).build());

        let mut queue = Queue::new(Arc::new(town.ops()));
        assert_eq!(queue.clear().unwrap(), 2);
        queue.load().unwrap();
        assert!(queue.is_empty());
    }
}
