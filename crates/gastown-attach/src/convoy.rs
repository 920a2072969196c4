//! Convoy tracking: at most one open tracking convoy per bead.
//!
//! Convoys are town-level container beads linked to work beads through
//! `tracks` dependencies. The uniqueness invariant is enforced by
//! checking before create/add; a racing second writer is repaired on the
//! next read because the first open tracker wins consistently.

use std::sync::Arc;

use gastown_core::enums::{BeadKind, DepType, Status};
use gastown_core::ids::{is_town_level, new_convoy_id};
use gastown_ops::{BeadPatch, CreateSpec, OpsError, Result, StoreRouter};

/// Creation hints recorded in the convoy's description.
#[derive(Debug, Clone, Default)]
pub struct ConvoyOptions {
    /// Emits an `Owned:` line naming the lifecycle owner.
    pub owned_by: Option<String>,
    /// Emits a `Merge:` line with the merge strategy.
    pub merge: Option<String>,
}

/// Tracks beads through auto-created convoys.
pub struct ConvoyTracker {
    router: Arc<dyn StoreRouter>,
}

impl ConvoyTracker {
    pub fn new(router: Arc<dyn StoreRouter>) -> Self {
        Self { router }
    }

    /// Returns the first open convoy tracking the bead, or `None`.
    ///
    /// A missing bead counts as untracked rather than an error.
    pub fn is_tracked(&self, bead_id: &str) -> Result<Option<String>> {
        let town = self.router.town_store();
        let key = self.tracking_key(bead_id);
        let trackers = match town.deps_up(&key, DepType::Tracks) {
            Ok(t) => t,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(trackers
            .into_iter()
            .find(|b| b.issue_type == BeadKind::Convoy && b.status == Status::Open)
            .map(|b| b.id))
    }

    /// Creates a fresh convoy tracking the bead and returns its id.
    ///
    /// Refuses when an open convoy already tracks the bead.
    pub fn auto_create(
        &self,
        bead_id: &str,
        title: &str,
        assignee: Option<&str>,
        opts: &ConvoyOptions,
    ) -> Result<String> {
        if let Some(existing) = self.is_tracked(bead_id)? {
            return Err(OpsError::conflict(format!(
                "{bead_id} already tracked by open convoy {existing}"
            )));
        }

        let mut description = String::new();
        if let Some(owner) = &opts.owned_by {
            description.push_str(&format!("Owned: {owner}\n"));
        }
        if let Some(merge) = &opts.merge {
            description.push_str(&format!("Merge: {merge}\n"));
        }

        let convoy_id = new_convoy_id();
        let town = self.router.town_store();
        town.create(&CreateSpec {
            id: Some(convoy_id.clone()),
            description,
            assignee: assignee.map(str::to_string),
            ..CreateSpec::new(title, BeadKind::Convoy)
        })?;

        self.add_tracks_dep(&convoy_id, bead_id)?;
        Ok(convoy_id)
    }

    /// Adds a bead to an existing convoy, reopening the convoy in place
    /// when it has been closed.
    pub fn add_to(&self, convoy_id: &str, bead_id: &str) -> Result<()> {
        let town = self.router.town_store();
        let convoy = town.show(convoy_id).map_err(|e| {
            if e.is_not_found() {
                OpsError::not_found("convoy", convoy_id)
            } else {
                e
            }
        })?;

        if convoy.issue_type != BeadKind::Convoy {
            return Err(OpsError::invalid_argument(format!(
                "{convoy_id} is a {} bead, not a convoy",
                convoy.issue_type
            )));
        }
        if convoy.status == Status::Closed {
            town.update(convoy_id, &BeadPatch::status(Status::Open))?;
        }

        self.add_tracks_dep(convoy_id, bead_id)
    }

    /// The dep target for a bead: external reference for rig beads so
    /// cross-rig lookups work, plain id for town beads.
    fn tracking_key(&self, bead_id: &str) -> String {
        if is_town_level(bead_id) {
            return bead_id.to_string();
        }
        self.router
            .external_ref(bead_id)
            .unwrap_or_else(|| bead_id.to_string())
    }

    fn add_tracks_dep(&self, convoy_id: &str, bead_id: &str) -> Result<()> {
        let town = self.router.town_store();
        town.dep_add(convoy_id, &self.tracking_key(bead_id), DepType::Tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gastown_core::bead::BeadBuilder;
    use gastown_ops::fake::FakeTown;
    use gastown_ops::BeadStore;
    use pretty_assertions::assert_eq;

    fn tracker(town: &Arc<FakeTown>) -> ConvoyTracker {
        ConvoyTracker::new(town.router())
    }

    fn seeded_town() -> Arc<FakeTown> {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.seed(BeadBuilder::new("Fix pumps").id("gt-x").build());
        town
    }

    #[test]
    fn auto_create_then_tracked() {
        let town = seeded_town();
        let tracker = tracker(&town);

        assert_eq!(tracker.is_tracked("gt-x").unwrap(), None);

        let convoy_id = tracker
            .auto_create("gt-x", "Convoy: fix pumps", Some("mayor"), &ConvoyOptions::default())
            .unwrap();
        assert!(convoy_id.starts_with("hq-cv-"));
        assert_eq!(tracker.is_tracked("gt-x").unwrap(), Some(convoy_id.clone()));

        let convoy = town.get(&convoy_id).unwrap();
        assert_eq!(convoy.issue_type, BeadKind::Convoy);
        assert_eq!(convoy.assignee, "mayor");

        // The tracks edge uses the external form for rig beads.
        assert_eq!(town.tracking_edges("gt-x"), vec![convoy_id]);
    }

    #[test]
    fn second_auto_create_conflicts() {
        let town = seeded_town();
        let tracker = tracker(&town);
        tracker
            .auto_create("gt-x", "Convoy", None, &ConvoyOptions::default())
            .unwrap();
        let err = tracker
            .auto_create("gt-x", "Convoy again", None, &ConvoyOptions::default())
            .unwrap_err();
        assert!(matches!(err, OpsError::Conflict { .. }));
    }

    #[test]
    fn closed_convoy_does_not_track_and_reopens_on_add() {
        let town = seeded_town();
        let tracker = tracker(&town);
        let convoy_id = tracker
            .auto_create("gt-x", "Convoy", None, &ConvoyOptions::default())
            .unwrap();

        town.town_store().close(&convoy_id, "done").unwrap();
        assert_eq!(tracker.is_tracked("gt-x").unwrap(), None);

        tracker.add_to(&convoy_id, "gt-x").unwrap();
        assert_eq!(town.get(&convoy_id).unwrap().status, Status::Open);
        assert_eq!(tracker.is_tracked("gt-x").unwrap(), Some(convoy_id));
    }

    #[test]
    fn add_to_rejects_non_convoys() {
        let town = seeded_town();
        town.seed(BeadBuilder::new("ordinary").id("hq-task").build());
        let tracker = tracker(&town);

        let err = tracker.add_to("hq-task", "gt-x").unwrap_err();
        assert!(matches!(err, OpsError::InvalidArgument { .. }));

        let err = tracker.add_to("hq-cv-zzzzz", "gt-x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn description_hints_when_requested() {
        let town = seeded_town();
        let tracker = tracker(&town);
        let convoy_id = tracker
            .auto_create(
                "gt-x",
                "Convoy",
                None,
                &ConvoyOptions {
                    owned_by: Some("refinery".into()),
                    merge: Some("squash".into()),
                },
            )
            .unwrap();
        let description = town.get(&convoy_id).unwrap().description;
        assert!(description.contains("Owned: refinery"));
        assert!(description.contains("Merge: squash"));
    }

    #[test]
    fn town_beads_tracked_by_plain_id() {
        let town = seeded_town();
        town.seed(BeadBuilder::new("town work").id("hq-t").build());
        let tracker = tracker(&town);

        let convoy_id = tracker
            .auto_create("hq-t", "Convoy", None, &ConvoyOptions::default())
            .unwrap();
        assert_eq!(tracker.is_tracked("hq-t").unwrap(), Some(convoy_id));
    }
}
