//! The conformance contract every store binding must honour.
//!
//! One suite runs against each [`StoreRouter`] implementation: the fake
//! (always) and the CLI binding from both the town root and a rig root
//! (when a `bd` binary is available). The suite covers label idempotence,
//! routing, closed-bead exclusion, town/rig visibility, and a blocker
//! lifecycle.

use std::sync::Arc;

use gastown_core::enums::{BeadKind, DepType};

use crate::routed::{RoutedOps, StoreRouter};
use crate::traits::{BeadsOps, CreateSpec};

/// What a binding hands the suite.
pub struct ConformanceCtx {
    /// Town-scoped router (sees every rig).
    pub town: Arc<dyn StoreRouter>,
    /// Router scoped to the conformance rig.
    pub rig: Arc<dyn StoreRouter>,
    /// Name of the conformance rig (e.g. `"gastown"`).
    pub rig_name: String,
    /// The rig's id prefix, hyphen included (e.g. `"gt-"`).
    pub rig_prefix: String,
}

/// Runs the full conformance suite, panicking on any contract violation.
pub fn run_conformance(ctx: &ConformanceCtx) {
    let town_ops = RoutedOps::new(Arc::clone(&ctx.town));
    let rig_ops = RoutedOps::new(Arc::clone(&ctx.rig));
    let p = &ctx.rig_prefix;

    // Seed beads through the routed stores; explicit multi-hyphen ids also
    // exercise the force path of the CLI binding.
    let rig_store = ctx
        .town
        .store_for(&format!("{p}seed"))
        .expect("rig prefix must route");
    let town_store = ctx.town.town_store();

    let a = format!("{p}conf-a");
    rig_store
        .create(&CreateSpec {
            id: Some(a.clone()),
            ..CreateSpec::new("conformance: labels", BeadKind::Task)
        })
        .expect("create bead a");

    // -- Town-level classification -------------------------------------------
    assert!(town_ops.is_town_level("hq-anything"));
    assert!(!town_ops.is_town_level(&a));

    // -- Label idempotence ---------------------------------------------------
    town_ops.label_add(&a, "conf-label").expect("label add");
    town_ops.label_add(&a, "conf-label").expect("re-add is a no-op");
    let bead = rig_store.show(&a).expect("show a");
    assert_eq!(
        bead.labels.iter().filter(|l| *l == "conf-label").count(),
        1,
        "label add must be idempotent"
    );

    town_ops.label_remove(&a, "conf-label").expect("label remove");
    town_ops
        .label_remove(&a, "conf-label")
        .expect("re-remove is a no-op");
    let bead = rig_store.show(&a).expect("show a");
    assert!(!bead.has_label("conf-label"));

    // -- Routing -------------------------------------------------------------
    assert_eq!(town_ops.rig_for_bead(&a), ctx.rig_name);
    assert_eq!(rig_ops.rig_for_bead(&a), ctx.rig_name);
    assert_eq!(town_ops.rig_for_bead("hq-x"), "");
    assert_eq!(town_ops.rig_for_bead("nohyphen"), "");

    // -- Ready semantics: closed beads excluded ------------------------------
    let b = format!("{p}conf-b");
    rig_store
        .create(&CreateSpec {
            id: Some(b.clone()),
            labels: vec!["conf-ready".into()],
            ..CreateSpec::new("conformance: ready", BeadKind::Task)
        })
        .expect("create bead b");
    let ready = town_ops.list_ready_by_label("conf-ready").expect("list");
    assert!(
        ready
            .get(&ctx.rig_name)
            .is_some_and(|beads| beads.iter().any(|x| x.id == b)),
        "open labelled bead must be ready"
    );

    rig_store.close(&b, "conformance").expect("close b");
    let ready = town_ops.list_ready_by_label("conf-ready").expect("list");
    assert!(
        !ready
            .get(&ctx.rig_name)
            .is_some_and(|beads| beads.iter().any(|x| x.id == b)),
        "closed bead must not be ready"
    );

    // -- Town/rig visibility -------------------------------------------------
    let t = "hq-conf-t".to_string();
    town_store
        .create(&CreateSpec {
            id: Some(t.clone()),
            labels: vec!["conf-town".into()],
            ..CreateSpec::new("conformance: town bead", BeadKind::Task)
        })
        .expect("create town bead");

    let from_town = town_ops.list_ready_by_label("conf-town").expect("list");
    assert!(
        from_town
            .get("")
            .is_some_and(|beads| beads.iter().any(|x| x.id == t)),
        "town bead must be visible from the town-level instance"
    );

    let from_rig = rig_ops.list_ready_by_label("conf-town").expect("list");
    assert!(
        from_rig.values().flatten().all(|x| x.id != t),
        "town bead must be invisible from a rig-level instance"
    );

    // -- Cross-rig mutation from the rig instance ----------------------------
    rig_ops
        .label_add(&t, "conf-cross")
        .expect("rig instance must forward town mutations");
    let town_bead = town_store.show(&t).expect("show town bead");
    assert!(town_bead.has_label("conf-cross"));

    // -- Blocker lifecycle ---------------------------------------------------
    let c = format!("{p}conf-c");
    let d = format!("{p}conf-d");
    rig_store
        .create(&CreateSpec {
            id: Some(c.clone()),
            labels: vec!["conf-blocked".into()],
            ..CreateSpec::new("conformance: blocked", BeadKind::Task)
        })
        .expect("create bead c");
    rig_store
        .create(&CreateSpec {
            id: Some(d.clone()),
            ..CreateSpec::new("conformance: blocker", BeadKind::Task)
        })
        .expect("create bead d");
    rig_store
        .dep_add(&c, &d, DepType::Blocks)
        .expect("add blocker");

    let ready = town_ops.list_ready_by_label("conf-blocked").expect("list");
    assert!(
        ready.values().flatten().all(|x| x.id != c),
        "bead with an open blocker must not be ready"
    );

    rig_store.close(&d, "conformance").expect("close blocker");
    let ready = town_ops.list_ready_by_label("conf-blocked").expect("list");
    assert!(
        ready
            .get(&ctx.rig_name)
            .is_some_and(|beads| beads.iter().any(|x| x.id == c)),
        "bead becomes ready once its blocker closes"
    );
}
