//! The hook write: status `hooked` plus assignee, verified and retried.
//!
//! A hook is the terminal write of dispatch: "this work has started on
//! agent X". The store's write path is flaky enough in practice (daemon
//! restarts, export races) that the write is verified by re-fetch and
//! retried with linear backoff. The hook is then mirrored into the
//! agent's own bead; mirror failures are logged, never fatal.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use gastown_core::attachment;
use gastown_core::enums::Status;
use gastown_core::ids::agent_bead;
use gastown_ops::{BeadPatch, BeadStore, OpsError, Result, StoreRouter};

/// Environment toggle that skips read-after verification in tests.
pub const SKIP_VERIFY_ENV: &str = "GT_SKIP_HOOK_VERIFY";

/// Attachment key holding the hooked bead id on an agent bead.
const HOOK_BEAD_KEY: &str = "hook_bead";

const MAX_ATTEMPTS: u32 = 3;

/// Writes hooks with verification and retry.
pub struct HookWriter {
    router: Arc<dyn StoreRouter>,
    backoff_unit: Duration,
}

impl HookWriter {
    pub fn new(router: Arc<dyn StoreRouter>) -> Self {
        Self {
            router,
            backoff_unit: Duration::from_millis(500),
        }
    }

    /// Overrides the backoff unit (tests shrink it).
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Hooks `bead_id` to `agent`: status `hooked`, assignee set, write
    /// verified, up to three attempts with `attempt * backoff` waits.
    ///
    /// On success the hook is mirrored into the agent's bead (best
    /// effort). On final failure the error names the attempt count.
    pub fn hook(&self, bead_id: &str, agent: &str) -> Result<()> {
        let store = self.router.store_for(bead_id)?;

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_hook(store.as_ref(), bead_id, agent) {
                Ok(()) => {
                    self.mirror_to_agent_bead(bead_id, agent);
                    return Ok(());
                }
                Err(e) => {
                    warn!(bead = bead_id, agent, attempt, error = %e, "hook write failed");
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        std::thread::sleep(self.backoff_unit * attempt);
                    }
                }
            }
        }

        let last = last_err.expect("at least one attempt ran");
        Err(OpsError::store(format!(
            "hooking {bead_id} to {agent} failed after {MAX_ATTEMPTS} attempts: {last}"
        )))
    }

    fn try_hook(&self, store: &dyn BeadStore, bead_id: &str, agent: &str) -> Result<()> {
        store.update(
            bead_id,
            &BeadPatch {
                status: Some(Status::Hooked),
                assignee: Some(agent.to_string()),
                ..Default::default()
            },
        )?;

        if skip_verify() {
            return Ok(());
        }

        let bead = store.show(bead_id)?;
        if bead.status != Status::Hooked || bead.assignee != agent {
            return Err(OpsError::verification(format!(
                "read-after shows status={} assignee={:?}",
                bead.status, bead.assignee
            )));
        }
        Ok(())
    }

    /// Records `hook_bead: <bead_id>` on the agent's own bead.
    ///
    /// The agent bead id derives from the agent identity; all derived ids
    /// are town-level. Failures here are logged and swallowed.
    fn mirror_to_agent_bead(&self, bead_id: &str, agent: &str) {
        let Some(agent_bead_id) = agent_bead::for_identity(agent) else {
            warn!(agent, "no agent bead id for identity; skipping hook mirror");
            return;
        };
        let result = (|| -> Result<()> {
            let store = self.router.store_for(&agent_bead_id)?;
            let bead = store.show(&agent_bead_id)?;
            let mut parsed = attachment::parse(&bead.description);
            parsed.set_extra(HOOK_BEAD_KEY, bead_id);
            store.update(&agent_bead_id, &BeadPatch::description(parsed.render()))
        })();
        if let Err(e) = result {
            warn!(agent_bead = %agent_bead_id, error = %e, "hook mirror failed");
        }
    }
}

fn skip_verify() -> bool {
    matches!(
        std::env::var(SKIP_VERIFY_ENV).as_deref(),
        Ok("1") | Ok("true")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gastown_core::bead::BeadBuilder;
    use gastown_ops::fake::FakeTown;
    use gastown_ops::{BondReceipt, CreateSpec, WispReceipt};
    use std::path::PathBuf;

    fn seeded_town() -> Arc<FakeTown> {
        let town = FakeTown::new();
        town.add_rig("gt-", "gastown");
        town.seed(BeadBuilder::new("Fix pumps").id("gt-abc").build());
        town.seed(
            BeadBuilder::new("Polecat: nux")
                .id("hq-polecat-gastown-nux")
                .build(),
        );
        town
    }

    fn writer(town: &Arc<FakeTown>) -> HookWriter {
        HookWriter::new(town.router()).with_backoff_unit(Duration::from_millis(1))
    }

    #[test]
    fn hook_sets_status_and_assignee() {
        let town = seeded_town();
        writer(&town).hook("gt-abc", "gastown/polecats/nux").unwrap();

        let bead = town.get("gt-abc").unwrap();
        assert_eq!(bead.status, Status::Hooked);
        assert_eq!(bead.assignee, "gastown/polecats/nux");
    }

    #[test]
    fn hook_mirrors_into_agent_bead() {
        let town = seeded_town();
        writer(&town).hook("gt-abc", "gastown/polecats/nux").unwrap();

        let agent = town.get("hq-polecat-gastown-nux").unwrap();
        let parsed = attachment::parse(&agent.description);
        assert_eq!(parsed.get_extra("hook_bead"), Some("gt-abc"));
    }

    #[test]
    fn missing_agent_bead_is_not_fatal() {
        let town = seeded_town();
        // max has no agent bead seeded; the hook itself must still land.
        writer(&town).hook("gt-abc", "gastown/crew/max").unwrap();
        assert_eq!(town.get("gt-abc").unwrap().status, Status::Hooked);
    }

    #[test]
    fn unknown_identity_skips_mirror() {
        let town = seeded_town();
        writer(&town).hook("gt-abc", "not/a/known/identity/shape").unwrap();
        assert_eq!(town.get("gt-abc").unwrap().status, Status::Hooked);
    }

    /// A store whose updates never land, driving the retry loop.
    struct BlackHole;
    impl BeadStore for BlackHole {
        fn create(&self, _spec: &CreateSpec) -> Result<gastown_core::bead::Bead> {
            Err(OpsError::store("read-only"))
        }
        fn show(&self, id: &str) -> Result<gastown_core::bead::Bead> {
            Ok(BeadBuilder::new("untouched").id(id).build())
        }
        fn list_open_by_label(&self, _label: &str) -> Result<Vec<gastown_core::bead::Bead>> {
            Ok(Vec::new())
        }
        fn update(&self, _id: &str, _patch: &BeadPatch) -> Result<()> {
            Ok(()) // claims success; verification catches the lie
        }
        fn close(&self, _id: &str, _reason: &str) -> Result<()> {
            Ok(())
        }
        fn dep_add(
            &self,
            _from: &str,
            _to: &str,
            _dep_type: gastown_core::enums::DepType,
        ) -> Result<()> {
            Ok(())
        }
        fn deps_up(
            &self,
            _id: &str,
            _dep_type: gastown_core::enums::DepType,
        ) -> Result<Vec<gastown_core::bead::Bead>> {
            Ok(Vec::new())
        }
        fn cook_formula(&self, _formula: &str) -> Result<()> {
            Ok(())
        }
        fn create_wisp(
            &self,
            _formula: &str,
            _vars: &[(String, String)],
        ) -> Result<WispReceipt> {
            Ok(WispReceipt::default())
        }
        fn bond(&self, _wisp_id: &str, _bead_id: &str) -> Result<BondReceipt> {
            Ok(BondReceipt::default())
        }
    }

    struct BlackHoleRouter;
    impl StoreRouter for BlackHoleRouter {
        fn store_for(&self, _bead_id: &str) -> Result<Arc<dyn BeadStore>> {
            Ok(Arc::new(BlackHole))
        }
        fn town_store(&self) -> Arc<dyn BeadStore> {
            Arc::new(BlackHole)
        }
        fn rigs(&self) -> Vec<(String, Arc<dyn BeadStore>)> {
            Vec::new()
        }
        fn rig_for_bead(&self, _id: &str) -> String {
            String::new()
        }
        fn external_ref(&self, _id: &str) -> Option<String> {
            None
        }
        fn dir_for_bead(&self, _id: &str) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn verification_mismatch_retries_then_fails() {
        let writer = HookWriter::new(Arc::new(BlackHoleRouter))
            .with_backoff_unit(Duration::from_millis(1));
        let err = writer.hook("gt-abc", "gastown/polecats/nux").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("after 3 attempts"), "got: {message}");

        // With verification toggled off, the same store "succeeds".
        unsafe { std::env::set_var(SKIP_VERIFY_ENV, "1") };
        let outcome = writer.hook("gt-abc", "gastown/polecats/nux");
        unsafe { std::env::remove_var(SKIP_VERIFY_ENV) };
        outcome.unwrap();
    }
}
