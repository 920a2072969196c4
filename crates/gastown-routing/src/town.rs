//! Town-level configuration files.
//!
//! A town root is the directory holding the town store (`.beads/` with the
//! `hq` prefix) and the rigs registry (`mayor/rigs.json`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

/// Environment variable overriding town-root discovery.
pub const TOWN_ROOT_ENV: &str = "GT_TOWN_ROOT";

/// Relative path of the rigs registry under the town root.
pub const RIGS_FILE: &str = "mayor/rigs.json";

/// Contents of the town store's `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TownConfig {
    /// Id prefix of the town store, without the hyphen (`"hq"`).
    pub prefix: String,

    /// Backing engine of the foreign store.
    #[serde(rename = "storage-backend", default)]
    pub storage_backend: String,
}

/// One registered rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigEntry {
    #[serde(default)]
    pub git_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// The `mayor/rigs.json` registry enumerating all rigs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigsRegistry {
    #[serde(default)]
    pub version: i32,

    #[serde(default)]
    pub rigs: BTreeMap<String, RigEntry>,
}

impl RigsRegistry {
    /// Returns the registered rig names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.rigs.keys().map(String::as_str).collect()
    }
}

/// Loads `<townRoot>/.beads/config.yaml`.
pub fn load_town_config(town_root: &Path) -> Result<TownConfig> {
    let path = town_root.join(".beads").join("config.yaml");
    let raw = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&raw).map_err(|e| RoutingError::parse(path.display().to_string(), e))
}

/// Loads `<townRoot>/mayor/rigs.json`; a missing file is an empty registry.
pub fn load_rigs_registry(town_root: &Path) -> Result<RigsRegistry> {
    let path = town_root.join(RIGS_FILE);
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RigsRegistry::default());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw).map_err(|e| RoutingError::parse(path.display().to_string(), e))
}

/// Walks up from `start` looking for a town root.
///
/// The `GT_TOWN_ROOT` environment variable wins when set and valid. A
/// directory qualifies when it holds `mayor/rigs.json`.
pub fn find_town_root(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(TOWN_ROOT_ENV) {
        let env_path = PathBuf::from(&env_dir);
        if env_path.is_dir() {
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    let mut current = start.as_path();
    loop {
        if current.join(RIGS_FILE).is_file() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }
    None
}

/// Like [`find_town_root`], converting `None` into an error.
pub fn find_town_root_or_error(start: &Path) -> Result<PathBuf> {
    find_town_root(start).ok_or(RoutingError::TownNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_town(root: &Path) {
        std::fs::create_dir_all(root.join(".beads")).unwrap();
        std::fs::write(
            root.join(".beads/config.yaml"),
            "prefix: hq\nstorage-backend: sqlite\n",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("mayor")).unwrap();
        std::fs::write(
            root.join(RIGS_FILE),
            r#"{"version":1,"rigs":{"gastown":{"git_url":"https://example.com/gastown.git"}}}"#,
        )
        .unwrap();
    }

    #[test]
    fn load_config_and_registry() {
        let tmp = tempfile::tempdir().unwrap();
        seed_town(tmp.path());

        let config = load_town_config(tmp.path()).unwrap();
        assert_eq!(config.prefix, "hq");
        assert_eq!(config.storage_backend, "sqlite");

        let registry = load_rigs_registry(tmp.path()).unwrap();
        assert_eq!(registry.names(), vec!["gastown"]);
    }

    #[test]
    fn missing_registry_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = load_rigs_registry(tmp.path()).unwrap();
        assert!(registry.rigs.is_empty());
    }

    #[test]
    fn find_town_root_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        seed_town(tmp.path());
        let deep = tmp.path().join("gastown/crew/max");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_town_root(&deep).unwrap();
        assert_eq!(
            found.canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn malformed_registry_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("mayor")).unwrap();
        std::fs::write(tmp.path().join(RIGS_FILE), "not json").unwrap();
        assert!(matches!(
            load_rigs_registry(tmp.path()),
            Err(RoutingError::Parse { .. })
        ));
    }
}
