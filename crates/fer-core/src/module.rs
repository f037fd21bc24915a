//! Module records (spec.md §3.5, §3.6) and the canonical key that
//! identifies one (spec.md GLOSSARY, "Canonical module key").

use std::{collections::HashSet, rc::Rc};

use indexmap::IndexMap;

use crate::{ast::FileAst, scope::ScopeId};

/// The canonical string form of a module's identity: a project-relative
/// path for local/builtin modules, or `host/owner/repo@version[/sub/path]`
/// for remote ones. Stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(pub String);

impl ModuleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Local,
    Builtin,
    Remote,
}

/// A module's position in the collect -> resolve -> check pipeline.
/// Monotonic per module (spec.md §3.5, §8 "Phase monotonicity").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    NotStarted,
    Parsed,
    Collected,
    Resolved,
    Checked,
}

impl Phase {
    /// The phase a module's imports must have reached before this module
    /// can advance to `self` (spec.md §2: "advancing to collected
    /// requires all imports parsed", etc.).
    pub fn import_prerequisite(self) -> Option<Phase> {
        match self {
            Phase::NotStarted => None,
            Phase::Parsed => None,
            Phase::Collected => Some(Phase::Parsed),
            Phase::Resolved => Some(Phase::Collected),
            Phase::Checked => Some(Phase::Resolved),
        }
    }
}

/// Tri-state cycle-detection marker (spec.md §9): a module is either not
/// being visited, in progress at some phase, or settled at a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    NotEntered,
    InProgress(Phase),
    Done(Phase),
}

#[derive(Debug)]
pub struct Module {
    pub key: ModuleKey,
    pub ast: Rc<FileAst>,
    pub top_scope: ScopeId,
    pub category: Category,
    pub entry: Entry,
    /// import alias -> target module key, plus the statement's position
    /// (for the unused-import warning) and whether it's been referenced.
    pub imports: IndexMap<String, ImportBinding>,
    /// Set once the collector finds this module on an import cycle. Checked
    /// by the orchestrator before every advancement attempt, so a blocked
    /// module never progresses past the phase it was blocked at, however it
    /// is reached (spec.md §8, "no phase change beyond Collected for
    /// either").
    pub blocked: bool,
    /// This module's own `remote.share` manifest flag (spec.md §4.1), read
    /// by the loader at registration time for `Category::Remote` modules.
    /// Meaningless for Local/Builtin modules, which default to `true`
    /// (sharing is only a remote-module concept).
    pub remote_share: bool,
}

#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub target: ModuleKey,
    pub position: std::ops::Range<usize>,
    pub used: bool,
}

impl Module {
    pub fn new(key: ModuleKey, ast: Rc<FileAst>, top_scope: ScopeId, category: Category) -> Self {
        Self {
            key,
            ast,
            top_scope,
            category,
            entry: Entry::NotEntered,
            imports: IndexMap::new(),
            blocked: false,
            remote_share: true,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.entry {
            Entry::NotEntered => Phase::Parsed,
            Entry::InProgress(p) | Entry::Done(p) => p,
        }
    }

    pub fn mark_used(&mut self, alias: &str) {
        if let Some(binding) = self.imports.get_mut(alias) {
            binding.used = true;
        }
    }

    pub fn unused_imports(&self) -> Vec<(&str, std::ops::Range<usize>)> {
        self.imports
            .iter()
            .filter(|(_, binding)| !binding.used)
            .map(|(alias, binding)| (alias.as_str(), binding.position.clone()))
            .collect()
    }

    /// Every module this one imports, in declaration order with duplicates
    /// removed (spec.md §5: analysis is deterministic, so import-graph
    /// traversal order must not depend on hashing).
    pub fn referenced_modules(&self) -> Vec<ModuleKey> {
        let mut seen = HashSet::new();
        self.imports
            .values()
            .map(|b| b.target.clone())
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }
}
