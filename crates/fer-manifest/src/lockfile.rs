//! The project lockfile (spec.md §6): a JSON record of the resolved
//! dependency graph, with add/remove operations that keep it consistent.

use std::collections::BTreeMap;

use fer_core::import::normalize_version;
use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOCKFILE_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lockfile {
    pub version: String,
    pub generated_at: String,
    pub dependencies: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockEntry {
    pub version: String,
    pub direct: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub used_by: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LockfileError {
    #[error("lockfile entry '{0}' already exists")]
    AlreadyExists(String),
    #[error("lockfile entry '{0}' not found")]
    NotFound(String),
    #[error("lockfile entry '{0}' has dependents and cannot be removed: {1:?}")]
    StillInUse(String, Vec<String>),
    #[error("lockfile is inconsistent: '{0}' references unknown key '{1}'")]
    DanglingReference(String, String),
}

impl Lockfile {
    pub fn new(generated_at: impl Into<String>) -> Self {
        Self { version: LOCKFILE_VERSION.to_string(), generated_at: generated_at.into(), dependencies: BTreeMap::new() }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Checks spec.md §8's lockfile-consistency invariant: every key named
    /// in any entry's `dependencies` or `used_by` list must itself be a
    /// top-level key.
    pub fn check_consistency(&self) -> Result<(), LockfileError> {
        for (key, entry) in &self.dependencies {
            for dep in entry.dependencies.iter().chain(entry.used_by.iter()) {
                if !self.dependencies.contains_key(dep) {
                    return Err(LockfileError::DanglingReference(key.clone(), dep.clone()));
                }
            }
        }
        Ok(())
    }

    /// Adds a direct dependency at `key` with `version`, along with its own
    /// transitive dependency keys (each of which must already be present,
    /// typically inserted by prior calls). Wires up `used_by` on every
    /// transitive the new entry depends on.
    pub fn add_direct(&mut self, key: &str, version: &str, transitive: &[String]) -> Result<(), LockfileError> {
        if self.dependencies.contains_key(key) {
            return Err(LockfileError::AlreadyExists(key.to_string()));
        }
        for dep in transitive {
            let entry = self.dependencies.get_mut(dep).ok_or_else(|| LockfileError::NotFound(dep.clone()))?;
            if !entry.used_by.iter().any(|u| u == key) {
                entry.used_by.push(key.to_string());
            }
        }
        self.dependencies.insert(
            key.to_string(),
            LockEntry { version: normalize_version(version), direct: true, dependencies: transitive.to_vec(), used_by: vec![] },
        );
        Ok(())
    }

    /// Adds a transitive-only entry (no `used_by` set yet; the caller wires
    /// that via the depending entry's `dependencies` list plus a subsequent
    /// `add_direct`/internal linkage).
    pub fn add_transitive(&mut self, key: &str, version: &str) {
        self.dependencies.entry(key.to_string()).or_insert_with(|| LockEntry {
            version: normalize_version(version),
            direct: false,
            dependencies: vec![],
            used_by: vec![],
        });
    }

    /// Removes `key` and cascades: any transitive dependency that becomes
    /// unused (empty `used_by`) as a result is removed too, repeating until
    /// no further removal is possible (spec.md §8 scenario 7). Returns the
    /// full set of keys removed, in removal order.
    pub fn remove(&mut self, key: &str) -> Result<Vec<String>, LockfileError> {
        let entry = self.dependencies.get(key).ok_or_else(|| LockfileError::NotFound(key.to_string()))?;
        if !entry.used_by.is_empty() {
            return Err(LockfileError::StillInUse(key.to_string(), entry.used_by.clone()));
        }

        let mut removed = IndexSet::new();
        let mut queue = vec![key.to_string()];

        while let Some(current) = queue.pop() {
            if removed.contains(&current) {
                continue;
            }
            let Some(entry) = self.dependencies.remove(&current) else { continue };
            debug!("removing '{current}' from lockfile");
            removed.insert(current.clone());

            for dep_key in &entry.dependencies {
                if let Some(dep_entry) = self.dependencies.get_mut(dep_key) {
                    dep_entry.used_by.retain(|u| u != &current);
                    if dep_entry.used_by.is_empty() && !dep_entry.direct {
                        queue.push(dep_key.clone());
                    }
                }
            }
        }

        Ok(removed.into_iter().collect())
    }

    pub fn removable(&self, key: &str) -> bool {
        self.dependencies.get(key).map(|e| e.used_by.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Lockfile {
        let mut lock = Lockfile::new("2026-01-01T00:00:00Z");
        lock.add_transitive("github.com/acme/base@v1.0.0", "v1.0.0");
        lock.add_direct("github.com/acme/widgets@v2.0.0", "v2.0.0", &["github.com/acme/base@v1.0.0".to_string()]).unwrap();
        lock.dependencies.get_mut("github.com/acme/base@v1.0.0").unwrap().used_by.push("github.com/acme/widgets@v2.0.0".to_string());
        lock.add_direct("github.com/acme/gizmos@v1.5.0", "v1.5.0", &["github.com/acme/base@v1.0.0".to_string()]).unwrap();
        lock.dependencies.get_mut("github.com/acme/base@v1.0.0").unwrap().used_by.push("github.com/acme/gizmos@v1.5.0".to_string());
        lock
    }

    #[test]
    fn consistency_holds_for_well_formed_lockfile() {
        assert!(sample().check_consistency().is_ok());
    }

    #[test]
    fn detects_dangling_reference() {
        let mut lock = sample();
        lock.dependencies.get_mut("github.com/acme/widgets@v2.0.0").unwrap().dependencies.push("nonexistent@v1".to_string());
        assert!(matches!(lock.check_consistency(), Err(LockfileError::DanglingReference(_, _))));
    }

    #[test]
    fn removing_one_direct_dep_leaves_transitive_reachable_via_other() {
        let mut lock = sample();
        let removed = lock.remove("github.com/acme/widgets@v2.0.0").unwrap();
        assert_eq!(removed, vec!["github.com/acme/widgets@v2.0.0".to_string()]);
        assert!(lock.dependencies.contains_key("github.com/acme/base@v1.0.0"));
        assert_eq!(lock.dependencies["github.com/acme/base@v1.0.0"].used_by, vec!["github.com/acme/gizmos@v1.5.0".to_string()]);
    }

    #[test]
    fn removing_last_direct_dep_cascades_to_unused_transitive() {
        let mut lock = sample();
        lock.remove("github.com/acme/widgets@v2.0.0").unwrap();
        let removed = lock.remove("github.com/acme/gizmos@v1.5.0").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!lock.dependencies.contains_key("github.com/acme/base@v1.0.0"));
        assert!(lock.check_consistency().is_ok());
    }

    #[test]
    fn removing_in_use_dependency_is_rejected() {
        let mut lock = sample();
        let err = lock.remove("github.com/acme/base@v1.0.0").unwrap_err();
        assert!(matches!(err, LockfileError::StillInUse(_, _)));
    }

    #[test]
    fn round_trip_through_json() {
        let lock = sample();
        let text = lock.render().unwrap();
        let parsed = Lockfile::parse(&text).unwrap();
        assert_eq!(lock, parsed);
    }
}
