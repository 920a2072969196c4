//! End-to-end CLI tests for the `gt` binary.
//!
//! These flows exercise the parts of `gt` that read the town layout
//! directly (routes, redirects); flows that need a live `bd` binary live
//! behind the gastown-ops conformance gate instead.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a `Command` targeting the cargo-built `gt` binary.
fn gt() -> Command {
    Command::cargo_bin("gt").unwrap()
}

/// Lay out a minimal town with two rigs.
fn seed_town() -> TempDir {
    let tmp = TempDir::new().unwrap();
    seed_town_at(tmp.path());
    tmp
}

fn seed_town_at(root: &Path) {
    std::fs::create_dir_all(root.join(".beads")).unwrap();
    std::fs::write(root.join(".beads/config.yaml"), "prefix: hq\n").unwrap();
    std::fs::write(
        root.join(".beads/routes.jsonl"),
        concat!(
            "# town routes\n",
            "{\"prefix\":\"hq-\",\"path\":\".\"}\n",
            "{\"prefix\":\"gt-\",\"path\":\"gastown/mayor/rig\"}\n",
            "{\"prefix\":\"gp-\",\"path\":\"greenplace/mayor/rig\"}\n",
        ),
    )
    .unwrap();
    std::fs::create_dir_all(root.join("mayor")).unwrap();
    std::fs::write(
        root.join("mayor/rigs.json"),
        r#"{"version":1,"rigs":{"gastown":{"git_url":""},"greenplace":{"git_url":""}}}"#,
    )
    .unwrap();
    std::fs::create_dir_all(root.join("gastown/mayor/rig/.beads")).unwrap();
    std::fs::create_dir_all(root.join("greenplace/mayor/rig/.beads")).unwrap();
}

// ---------------------------------------------------------------------------
// Version / help
// ---------------------------------------------------------------------------

#[test]
fn version_runs_without_a_town() {
    gt().arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("gt "));
}

#[test]
fn help_lists_commands() {
    gt().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue"))
        .stdout(predicate::str::contains("dispatch"))
        .stdout(predicate::str::contains("routes"));
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[test]
fn routes_list_reads_the_table() {
    let town = seed_town();
    gt().args(["routes", "list"])
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("gt-"))
        .stdout(predicate::str::contains("gastown/mayor/rig"))
        .stdout(predicate::str::contains("greenplace/mayor/rig"));
}

#[test]
fn routes_conflicts_surface_duplicates() {
    let town = seed_town();
    // Append a second claim on gt-.
    let routes = town.path().join(".beads/routes.jsonl");
    let mut contents = std::fs::read_to_string(&routes).unwrap();
    contents.push_str("{\"prefix\":\"gt-\",\"path\":\"elsewhere/mayor/rig\"}\n");
    std::fs::write(&routes, contents).unwrap();

    gt().args(["routes", "conflicts"])
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("gt-"))
        .stdout(predicate::str::contains("elsewhere/mayor/rig"));
}

#[test]
fn routes_json_output() {
    let town = seed_town();
    let output = gt()
        .args(["routes", "list", "--json"])
        .args(["--town", town.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let routes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let arr = routes.as_array().expect("routes --json returns an array");
    assert_eq!(arr.len(), 3);
    assert!(arr.iter().any(|r| r["prefix"] == "gt-"));
}

#[test]
fn rigs_lists_the_registry() {
    let town = seed_town();
    gt().arg("rigs")
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("gastown"))
        .stdout(predicate::str::contains("greenplace"));
}

// ---------------------------------------------------------------------------
// Redirect
// ---------------------------------------------------------------------------

#[test]
fn redirect_setup_then_resolve() {
    let town = seed_town();
    let rig = town.path().join("gastown/mayor/rig");
    let worktree = town.path().join("gastown/polecats/nux");
    std::fs::create_dir_all(&worktree).unwrap();

    gt().args(["redirect", "setup"])
        .arg(worktree.to_str().unwrap())
        .arg(rig.to_str().unwrap())
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .success();

    let written = std::fs::read_to_string(worktree.join(".beads/redirect")).unwrap();
    assert_eq!(written.trim(), "../../mayor/rig/.beads");

    gt().args(["redirect", "resolve"])
        .arg(worktree.to_str().unwrap())
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("mayor/rig/.beads"));
}

#[test]
fn redirect_setup_refuses_canonical_store() {
    let town = seed_town();
    let rig = town.path().join("gastown/mayor/rig");

    gt().args(["redirect", "setup"])
        .arg(rig.to_str().unwrap())
        .arg(rig.to_str().unwrap())
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("canonical"));
}

// ---------------------------------------------------------------------------
// Error surface
// ---------------------------------------------------------------------------

#[test]
fn missing_town_is_a_clean_error() {
    let empty = TempDir::new().unwrap();
    gt().args(["routes", "list"])
        .current_dir(empty.path())
        .env_remove("GT_TOWN_ROOT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("town"));
}

#[test]
fn dispatch_requires_spawner_unless_dry_run() {
    let town = seed_town();
    gt().arg("dispatch")
        .args(["--town", town.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--spawner"));
}
