//! Bead struct -- the atomic work unit of a Gas Town.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{BeadKind, Status};

/// Helper for `skip_serializing_if` on `Vec` fields.
fn is_empty_vec<T>(v: &Vec<T>) -> bool {
    v.is_empty()
}

/// A trackable work unit as exposed by the issue store's JSON surface.
///
/// This is the dispatch core's projection of a store issue: identity,
/// workflow state, labels and the two dependency id lists. Everything else
/// the store knows about an issue stays in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Free text; may start with an attachment-field block (see
    /// [`crate::attachment`]).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Status::is_default")]
    pub status: Status,

    #[serde(default, skip_serializing_if = "BeadKind::is_default")]
    pub issue_type: BeadKind,

    /// Priority 0-4, lower is more urgent.
    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee: String,

    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub labels: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Ids of beads this bead blocks.
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub blocks: Vec<String>,

    /// Ids of beads that must close before this bead is ready.
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub blocked_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

impl Default for Bead {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            status: Status::Open,
            issue_type: BeadKind::Task,
            priority: 0,
            assignee: String::new(),
            labels: Vec::new(),
            created_at: Utc::now(),
            closed_at: None,
            blocks: Vec::new(),
            blocked_by: Vec::new(),
            external_ref: None,
        }
    }
}

impl Bead {
    /// Returns `true` if the bead carries the given label.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Evaluates the readiness invariant: open, and every blocker closed.
    ///
    /// `blocker_status` resolves a blocker id to its status; a blocker that
    /// cannot be resolved counts as open, keeping the bead out of ready
    /// lists.
    pub fn is_ready_with<F>(&self, mut blocker_status: F) -> bool
    where
        F: FnMut(&str) -> Option<Status>,
    {
        if self.status != Status::Open {
            return false;
        }
        self.blocked_by
            .iter()
            .all(|id| blocker_status(id).is_some_and(|s| s.is_closed()))
    }
}

/// Builder for constructing a [`Bead`] with a fluent API.
pub struct BeadBuilder {
    bead: Bead,
}

impl BeadBuilder {
    /// Creates a new builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let mut bead = Bead::default();
        bead.title = title.into();
        Self { bead }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.bead.id = id.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.bead.description = description.into();
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.bead.status = status;
        self
    }

    pub fn issue_type(mut self, kind: BeadKind) -> Self {
        self.bead.issue_type = kind;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.bead.priority = priority;
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.bead.assignee = assignee.into();
        self
    }

    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.bead.labels = labels;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.bead.labels.push(label.into());
        self
    }

    pub fn created_at(mut self, t: DateTime<Utc>) -> Self {
        self.bead.created_at = t;
        self
    }

    pub fn closed_at(mut self, t: DateTime<Utc>) -> Self {
        self.bead.closed_at = Some(t);
        self
    }

    pub fn blocked_by(mut self, ids: Vec<String>) -> Self {
        self.bead.blocked_by = ids;
        self
    }

    pub fn blocks(mut self, ids: Vec<String>) -> Self {
        self.bead.blocks = ids;
        self
    }

    pub fn external_ref(mut self, ext: impl Into<String>) -> Self {
        self.bead.external_ref = Some(ext.into());
        self
    }

    /// Consumes the builder and returns the constructed [`Bead`].
    pub fn build(self) -> Bead {
        self.bead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bead() {
        let bead = Bead::default();
        assert_eq!(bead.status, Status::Open);
        assert_eq!(bead.issue_type, BeadKind::Task);
        assert_eq!(bead.priority, 0);
    }

    #[test]
    fn builder_basic() {
        let bead = BeadBuilder::new("Fix the flare stack")
            .id("gt-abc")
            .priority(1)
            .status(Status::Hooked)
            .assignee("polecat/nux")
            .label("queued")
            .build();

        assert_eq!(bead.id, "gt-abc");
        assert_eq!(bead.title, "Fix the flare stack");
        assert_eq!(bead.priority, 1);
        assert_eq!(bead.status, Status::Hooked);
        assert!(bead.has_label("queued"));
        assert!(!bead.has_label("pinned"));
    }

    #[test]
    fn bead_serde_roundtrip() {
        let bead = BeadBuilder::new("Test bead")
            .id("gt-abc123")
            .description("A test description")
            .blocked_by(vec!["gt-dep".into()])
            .build();

        let json = serde_json::to_string(&bead).unwrap();
        let back: Bead = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, "gt-abc123");
        assert_eq!(back.title, "Test bead");
        assert_eq!(back.blocked_by, vec!["gt-dep".to_string()]);
    }

    #[test]
    fn ready_requires_open_status() {
        let bead = BeadBuilder::new("x").status(Status::Hooked).build();
        assert!(!bead.is_ready_with(|_| Some(Status::Closed)));
    }

    #[test]
    fn ready_requires_all_blockers_closed() {
        let bead = BeadBuilder::new("x")
            .blocked_by(vec!["gt-a".into(), "gt-b".into()])
            .build();

        assert!(bead.is_ready_with(|_| Some(Status::Closed)));
        assert!(!bead.is_ready_with(|id| {
            Some(if id == "gt-a" { Status::Open } else { Status::Closed })
        }));
    }

    #[test]
    fn unresolvable_blocker_counts_as_open() {
        let bead = BeadBuilder::new("x").blocked_by(vec!["zz-gone".into()]).build();
        assert!(!bead.is_ready_with(|_| None));
    }

    #[test]
    fn no_blockers_is_ready() {
        let bead = BeadBuilder::new("x").build();
        assert!(bead.is_ready_with(|_| None));
    }
}
