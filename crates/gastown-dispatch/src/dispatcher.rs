//! The parallel dispatcher: queue items out to a spawner.
//!
//! Each item succeeds or fails independently; successes leave the queue,
//! failures stay queued for the next pass. The dispatcher itself adds no
//! deadlines -- a spawner owns its own.

use std::thread;

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use gastown_ops::Result;

use crate::queue::{Queue, QueueItem};
use crate::spawner::Spawner;

/// Dispatch tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Plan only: no spawner calls, no label changes.
    pub dry_run: bool,
    /// Maximum items dispatched per invocation; 0 means unlimited.
    pub limit: usize,
    /// Worker fan-out; 0 or 1 runs sequentially.
    pub parallelism: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: 0,
            parallelism: 1,
        }
    }
}

/// A per-item dispatch failure.
#[derive(Debug, Clone)]
pub struct ItemError {
    pub bead_id: String,
    pub message: String,
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.bead_id, self.message)
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Default)]
pub struct DispatchResult {
    /// Items handed to the spawner successfully (or kept, in dry-run).
    pub dispatched: Vec<QueueItem>,
    /// Items beyond the limit, untouched.
    pub skipped: Vec<QueueItem>,
    /// Per-item failures; the beads stay queued.
    pub errors: Vec<ItemError>,
}

impl DispatchResult {
    /// Returns `true` when every item dispatched cleanly.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Folds the per-item failures into one aggregate error.
    pub fn to_error(&self) -> Option<gastown_ops::OpsError> {
        if self.errors.is_empty() {
            return None;
        }
        Some(gastown_ops::OpsError::Partial {
            succeeded: self.dispatched.len(),
            errors: self.errors.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Consumes a [`Queue`] and fans items out to a [`Spawner`].
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// Runs one dispatch pass.
    ///
    /// Items with an empty rig name are recorded as errors without
    /// counting against the limit. In dry-run the kept set is reported as
    /// dispatched with no side effects. Otherwise every success is removed
    /// from the queue (best-effort); failures leave the bead queued.
    pub fn dispatch(&self, queue: &mut Queue, spawner: &dyn Spawner) -> Result<DispatchResult> {
        let items = queue.load()?.to_vec();
        let mut result = DispatchResult::default();

        // Town beads and route holes surface here rather than at spawn.
        let valid: Vec<QueueItem> = items
            .into_iter()
            .filter_map(|item| {
                if item.rig_name.is_empty() {
                    result.errors.push(ItemError {
                        bead_id: item.bead_id.clone(),
                        message: "no rig for bead; cannot spawn".to_string(),
                    });
                    None
                } else {
                    Some(item)
                }
            })
            .collect();

        let (kept, skipped) = if self.config.limit > 0 && valid.len() > self.config.limit {
            let mut kept = valid;
            let overflow = kept.split_off(self.config.limit);
            (kept, overflow)
        } else {
            (valid, Vec::new())
        };
        result.skipped = skipped;

        if self.config.dry_run {
            debug!(kept = kept.len(), "dry-run dispatch");
            result.dispatched = kept;
            return Ok(result);
        }

        let outcomes = self.run_spawns(kept, spawner);
        for (item, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    // Removal is best-effort; a stale label is re-observed
                    // on the next load.
                    if let Err(e) = queue.remove(&item.bead_id) {
                        warn!(bead = %item.bead_id, error = %e, "failed to dequeue dispatched bead");
                    }
                    result.dispatched.push(item);
                }
                Err(e) => result.errors.push(ItemError {
                    bead_id: item.bead_id.clone(),
                    message: e.to_string(),
                }),
            }
        }
        Ok(result)
    }

    /// Runs the spawner over the kept set with bounded fan-out.
    fn run_spawns(
        &self,
        kept: Vec<QueueItem>,
        spawner: &dyn Spawner,
    ) -> Vec<(QueueItem, Result<()>)> {
        let workers = self.config.parallelism.max(1).min(kept.len().max(1));
        if workers <= 1 {
            return kept
                .into_iter()
                .map(|item| {
                    let outcome = spawner.spawn_in(&item.rig_name, &item.bead_id);
                    (item, outcome)
                })
                .collect();
        }

        let (work_tx, work_rx) = unbounded::<QueueItem>();
        let (done_tx, done_rx) = unbounded::<(QueueItem, Result<()>)>();
        for item in kept {
            work_tx.send(item).expect("work channel open");
        }
        drop(work_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    for item in work_rx.iter() {
                        let outcome = spawner.spawn_in(&item.rig_name, &item.bead_id);
                        done_tx.send((item, outcome)).expect("done channel open");
                    }
                });
            }
        });
        drop(done_tx);

        done_rx.iter().collect()
    }
}
