//! The spawner contract.

use gastown_ops::Result;

/// Launches a worker for one bead inside one rig.
///
/// Implementations own their own deadlines and cleanup; the dispatcher
/// never interrupts an in-flight spawn.
pub trait Spawner: Send + Sync {
    /// Spawns a worker in `rig` for `bead_id`.
    fn spawn_in(&self, rig: &str, bead_id: &str) -> Result<()>;
}

/// A spawner that does nothing; the dry-run branch never calls it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpawner;

impl Spawner for NoopSpawner {
    fn spawn_in(&self, _rig: &str, _bead_id: &str) -> Result<()> {
        Ok(())
    }
}
