//! Formula-on-bead attachment.
//!
//! Attaching is a strict happens-before chain: cook the formula's proto,
//! instantiate a wisp with variables derived from the target bead, bond
//! the wisp to the bead, then record the compound root in the bead's
//! attachment fields. Every stage is fatal to the attach; the bond is not
//! rolled back on a late failure because bonding is idempotent per
//! (wisp, bead).

use std::sync::Arc;

use chrono::Utc;

use gastown_core::attachment;
use gastown_ops::{BeadPatch, OpsError, Result, StoreRouter};

/// Caller knobs for one attach operation.
#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    /// Skip cooking when the proto is known to exist.
    pub skip_cook: bool,
    /// Extra `key=value` variables handed to the wisp.
    pub vars: Vec<(String, String)>,
    /// Recorded as the `mode` attachment field when non-empty.
    pub mode: String,
    /// Recorded as the `dispatched_by` attachment field when non-empty.
    pub dispatched_by: String,
    /// Recorded as the `attached_args` attachment field when non-empty.
    pub attached_args: String,
    /// Recorded as the `merge_strategy` attachment field when non-empty.
    pub merge_strategy: String,
    /// Sets the `no_merge` attachment field.
    pub no_merge: bool,
    /// Sets the `convoy_owned` attachment field.
    pub convoy_owned: bool,
    /// Recorded as the `oj_job_id` attachment field when non-empty.
    pub oj_job_id: String,
}

/// Cooks, instantiates and bonds formulas onto beads.
pub struct FormulaAttacher {
    router: Arc<dyn StoreRouter>,
}

impl FormulaAttacher {
    pub fn new(router: Arc<dyn StoreRouter>) -> Self {
        Self { router }
    }

    /// Attaches `formula` to `bead_id`, returning the compound root id.
    pub fn attach(&self, formula: &str, bead_id: &str, opts: &AttachOptions) -> Result<String> {
        // All store work happens in the bead's rig; the CLI binding runs
        // its child processes in that directory.
        let store = self.router.store_for(bead_id)?;
        let bead = store.show(bead_id)?;

        if !opts.skip_cook {
            store.cook_formula(formula)?;
        }

        let mut vars: Vec<(String, String)> = vec![
            ("feature".to_string(), bead.title.clone()),
            ("issue".to_string(), bead.id.clone()),
        ];
        vars.extend(opts.vars.iter().cloned());

        let receipt = store.create_wisp(formula, &vars)?;
        let mut root = receipt
            .root()
            .ok_or_else(|| {
                OpsError::store(format!("wisp of {formula} reported no root id"))
            })?
            .to_string();

        let bond = store.bond(&root, bead_id)?;
        if let Some(new_root) = bond.root_id.filter(|r| !r.is_empty()) {
            root = new_root;
        }

        // Read-modify-write; the attach fields are ours by convention so
        // concurrent writers of other fields are tolerated.
        let current = store.show(bead_id)?;
        let description = attachment::update_fields(&current.description, |f| {
            f.attached_molecule = root.clone();
            f.attached_at = Some(Utc::now());
            if !opts.mode.is_empty() {
                f.mode = opts.mode.clone();
            }
            if !opts.dispatched_by.is_empty() {
                f.dispatched_by = opts.dispatched_by.clone();
            }
            if !opts.attached_args.is_empty() {
                f.attached_args = opts.attached_args.clone();
            }
            if !opts.merge_strategy.is_empty() {
                f.merge_strategy = opts.merge_strategy.clone();
            }
            if opts.no_merge {
                f.no_merge = true;
            }
            if opts.convoy_owned {
                f.convoy_owned = true;
            }
            if !opts.oj_job_id.is_empty() {
                f.oj_job_id = opts.oj_job_id.clone();
            }
        });
        store.update(bead_id, &BeadPatch::description(description))?;

        Ok(root)
    }
}
