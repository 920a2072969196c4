//! `.beads/redirect` resolution and worktree setup.
//!
//! A worktree delegates its store to the rig's canonical location through a
//! one-line `redirect` file holding a relative path. Resolution is rooted
//! at the worktree directory (the parent of `.beads`), not at `.beads`
//! itself. Chains are followed to a fixed depth; a self-loop is healed by
//! removing the offending file.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{Result, RoutingError};
use crate::runtime;

/// Name of the store metadata directory.
pub const BEADS_DIR: &str = ".beads";

/// Name of the redirect file inside `.beads`.
pub const REDIRECT_FILE: &str = "redirect";

/// Maximum redirect hops before resolution gives up.
const MAX_REDIRECT_DEPTH: u32 = 3;

/// Runtime artifacts removed when repointing a worktree's `.beads`.
///
/// Tracked content (formulas, README, config.yaml, .gitignore) stays.
const RUNTIME_FILES: &[&str] = &[
    "issues.jsonl",
    "interactions.jsonl",
    "metadata.json",
    REDIRECT_FILE,
];

/// Computes the effective store directory for a working directory.
///
/// Follows `<workDir>/.beads/redirect` chains up to three hops. An absent
/// or blank redirect yields `<workDir>/.beads`. A redirect pointing back
/// at its own `.beads` is removed and the local directory returned.
pub fn resolve_beads_dir(work_dir: &Path) -> PathBuf {
    // Invoked on the .beads dir itself: step up to its parent first.
    let work_dir = if work_dir.file_name().is_some_and(|n| n == BEADS_DIR) {
        work_dir.parent().unwrap_or(work_dir)
    } else {
        work_dir
    };
    resolve_from(work_dir, MAX_REDIRECT_DEPTH)
}

fn resolve_from(dir: &Path, depth: u32) -> PathBuf {
    let beads = dir.join(BEADS_DIR);
    let Some(target) = read_redirect(&beads) else {
        return beads;
    };

    // The relative target resolves against the work dir, not .beads.
    let resolved = lexical_normalize(&dir.join(&target));

    if resolved == lexical_normalize(&beads) {
        warn!(
            redirect = %beads.join(REDIRECT_FILE).display(),
            "redirect points at itself, removing"
        );
        let _ = fs::remove_file(beads.join(REDIRECT_FILE));
        return beads;
    }

    if depth <= 1 {
        warn!(
            target = %resolved.display(),
            "redirect depth exceeded, stopping at current target"
        );
        return resolved;
    }

    match resolved.parent() {
        Some(parent) => resolve_from(parent, depth - 1),
        None => resolved,
    }
}

/// Reads a redirect file; `None` when absent or whitespace-only.
fn read_redirect(beads_dir: &Path) -> Option<String> {
    let raw = fs::read_to_string(beads_dir.join(REDIRECT_FILE)).ok()?;
    let target = raw.trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Points a worktree's `.beads` at the rig's canonical store.
///
/// The rig's own redirect, if any, is chased first so the worktree points
/// at the final destination rather than forming a chain. Gitignored
/// runtime artifacts in an existing worktree `.beads` are removed; tracked
/// content is preserved. Returns the resolved target directory.
///
/// # Errors
///
/// Refuses when the daemon owns the store, or when the worktree is the
/// canonical `mayor/rig` location (writing there would form a cycle).
pub fn setup_worktree_redirect(worktree_dir: &Path, rig_dir: &Path) -> Result<PathBuf> {
    if runtime::is_daemon_mode() {
        return Err(RoutingError::DaemonOwned);
    }
    if is_canonical_store(worktree_dir) {
        return Err(RoutingError::CanonicalStore {
            path: worktree_dir.display().to_string(),
        });
    }

    // Chase the rig's own redirect; downstream consumers do not follow
    // chains.
    let target = resolve_beads_dir(rig_dir);

    let beads = worktree_dir.join(BEADS_DIR);
    if beads.is_dir() {
        clean_runtime_artifacts(&beads)?;
    } else {
        fs::create_dir_all(&beads)?;
    }

    let relative = relative_to(worktree_dir, &target);
    fs::write(
        beads.join(REDIRECT_FILE),
        format!("{}\n", relative.display()),
    )?;
    Ok(target)
}

/// Returns `true` for the canonical `mayor/rig` store location.
fn is_canonical_store(dir: &Path) -> bool {
    let mut components = dir.components().rev();
    components.next().is_some_and(|c| c.as_os_str() == "rig")
        && components.next().is_some_and(|c| c.as_os_str() == "mayor")
}

/// Removes gitignored runtime state from a `.beads` directory.
fn clean_runtime_artifacts(beads_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(beads_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let path = entry.path();

        let is_runtime = RUNTIME_FILES.contains(&name.as_ref())
            || name.ends_with(".db")
            || name.ends_with(".db-shm")
            || name.ends_with(".db-wal")
            || name.ends_with(".sock")
            || name.ends_with(".lock")
            || name == "mq";

        if !is_runtime {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Lexically normalizes a path: resolves `.` and `..` without touching the
/// filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Computes the relative path from `from` (a directory) to `to`, lexically.
fn relative_to(from: &Path, to: &Path) -> PathBuf {
    let from = lexical_normalize(from);
    let to = lexical_normalize(to);

    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from_parts.len() {
        out.push("..");
    }
    for part in &to_parts[common..] {
        out.push(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_redirect(dir: &Path, target: &str) {
        let beads = dir.join(BEADS_DIR);
        fs::create_dir_all(&beads).unwrap();
        fs::write(beads.join(REDIRECT_FILE), format!("{target}\n")).unwrap();
    }

    #[test]
    fn no_redirect_returns_local() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rig");
        fs::create_dir_all(dir.join(BEADS_DIR)).unwrap();
        assert_eq!(resolve_beads_dir(&dir), dir.join(BEADS_DIR));
    }

    #[test]
    fn blank_redirect_returns_local() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rig");
        write_redirect(&dir, "   ");
        assert_eq!(resolve_beads_dir(&dir), dir.join(BEADS_DIR));
    }

    #[test]
    fn relative_target_resolves_against_work_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = tmp.path().join("rig");
        let crew = rig.join("crew").join("max");
        fs::create_dir_all(rig.join("mayor/rig/.beads")).unwrap();
        write_redirect(&crew, "../../mayor/rig/.beads");

        assert_eq!(
            resolve_beads_dir(&crew),
            lexical_normalize(&rig.join("mayor/rig/.beads"))
        );
    }

    #[test]
    fn invoked_on_beads_dir_steps_up() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = tmp.path().join("rig");
        let crew = rig.join("crew").join("max");
        write_redirect(&crew, "../../mayor/rig/.beads");

        assert_eq!(
            resolve_beads_dir(&crew.join(BEADS_DIR)),
            lexical_normalize(&rig.join("mayor/rig/.beads"))
        );
    }

    #[test]
    fn chain_followed_to_depth() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let c = tmp.path().join("c");
        write_redirect(&a, "../b/.beads");
        write_redirect(&b, "../c/.beads");
        fs::create_dir_all(c.join(BEADS_DIR)).unwrap();

        assert_eq!(
            resolve_beads_dir(&a),
            lexical_normalize(&c.join(BEADS_DIR))
        );
    }

    #[test]
    fn self_loop_heals_by_removing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rig");
        write_redirect(&dir, ".beads");

        assert_eq!(resolve_beads_dir(&dir), dir.join(BEADS_DIR));
        assert!(!dir.join(BEADS_DIR).join(REDIRECT_FILE).exists());
    }

    #[test]
    fn depth_cap_stops_long_chains() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs: Vec<PathBuf> = (0..5).map(|i| tmp.path().join(format!("d{i}"))).collect();
        for i in 0..4 {
            let target = format!("../d{}/.beads", i + 1);
            write_redirect(&dirs[i], &target);
        }
        fs::create_dir_all(dirs[4].join(BEADS_DIR)).unwrap();

        // Three hops from d0 lands on d3's .beads; the fourth is not taken.
        assert_eq!(
            resolve_beads_dir(&dirs[0]),
            lexical_normalize(&dirs[3].join(BEADS_DIR))
        );
    }

    #[test]
    fn setup_writes_relative_redirect() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = tmp.path().join("rig");
        let canonical = rig.join("mayor").join("rig");
        fs::create_dir_all(canonical.join(BEADS_DIR)).unwrap();
        let worktree = rig.join("polecats").join("nux");
        fs::create_dir_all(&worktree).unwrap();

        let target = setup_worktree_redirect(&worktree, &canonical).unwrap();
        assert_eq!(target, lexical_normalize(&canonical.join(BEADS_DIR)));

        let written =
            fs::read_to_string(worktree.join(BEADS_DIR).join(REDIRECT_FILE)).unwrap();
        assert_eq!(written.trim(), "../../mayor/rig/.beads");
        assert_eq!(resolve_beads_dir(&worktree), target);
    }

    #[test]
    fn setup_chases_existing_rig_redirect() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = tmp.path().join("rig");
        let canonical = rig.join("mayor").join("rig");
        fs::create_dir_all(canonical.join(BEADS_DIR)).unwrap();
        // The rig root itself redirects to the canonical store.
        write_redirect(&rig, "mayor/rig/.beads");

        let worktree = rig.join("crew").join("max");
        fs::create_dir_all(&worktree).unwrap();

        let target = setup_worktree_redirect(&worktree, &rig).unwrap();
        assert_eq!(target, lexical_normalize(&canonical.join(BEADS_DIR)));
        // The worktree points at the final destination, not at the chain.
        let written =
            fs::read_to_string(worktree.join(BEADS_DIR).join(REDIRECT_FILE)).unwrap();
        assert_eq!(written.trim(), "../../mayor/rig/.beads");
    }

    #[test]
    fn setup_refuses_canonical_location() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = tmp.path().join("rig").join("mayor").join("rig");
        fs::create_dir_all(&canonical).unwrap();

        let err = setup_worktree_redirect(&canonical, &canonical).unwrap_err();
        assert!(matches!(err, RoutingError::CanonicalStore { .. }));
    }

    #[test]
    fn setup_cleans_runtime_artifacts_preserving_tracked() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = tmp.path().join("rig");
        let canonical = rig.join("mayor").join("rig");
        fs::create_dir_all(canonical.join(BEADS_DIR)).unwrap();

        let worktree = rig.join("polecats").join("nux");
        let beads = worktree.join(BEADS_DIR);
        fs::create_dir_all(beads.join("mq")).unwrap();
        fs::create_dir_all(beads.join("formulas")).unwrap();
        fs::write(beads.join("beads.db"), b"x").unwrap();
        fs::write(beads.join("issues.jsonl"), b"{}").unwrap();
        fs::write(beads.join("metadata.json"), b"{}").unwrap();
        fs::write(beads.join("config.yaml"), b"prefix: gt").unwrap();
        fs::write(beads.join("README.md"), b"#").unwrap();
        fs::write(beads.join(".gitignore"), b"*.db").unwrap();

        setup_worktree_redirect(&worktree, &canonical).unwrap();

        assert!(!beads.join("mq").exists());
        assert!(!beads.join("beads.db").exists());
        assert!(!beads.join("issues.jsonl").exists());
        assert!(!beads.join("metadata.json").exists());
        assert!(beads.join("formulas").is_dir());
        assert!(beads.join("config.yaml").exists());
        assert!(beads.join("README.md").exists());
        assert!(beads.join(".gitignore").exists());
        assert!(beads.join(REDIRECT_FILE).exists());
    }

    #[test]
    fn lexical_normalize_collapses_dots() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }

    #[test]
    fn relative_to_computes_upward_depth() {
        assert_eq!(
            relative_to(Path::new("/rig/crew/max"), Path::new("/rig/mayor/rig/.beads")),
            PathBuf::from("../../mayor/rig/.beads")
        );
        assert_eq!(
            relative_to(Path::new("/rig"), Path::new("/rig/.beads")),
            PathBuf::from(".beads")
        );
    }
}
