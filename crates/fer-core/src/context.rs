//! The shared state threaded through every phase: the module registry, the
//! scope tree, the diagnostics report, and the prelude scope that exposes
//! primitive type names to every module (spec.md §3.2, §3.4).

use indexmap::IndexMap;

use crate::{
    diagnostics::Report,
    module::ModuleKey,
    registry::ModuleRegistry,
    scope::{Scope, ScopeId, ScopeTree},
    symbol::{Symbol, SymbolKind},
    types::{Primitive, Type},
};

/// The synthetic module key the prelude scope is attributed to. Never
/// appears in the registry; it exists only so [`Scope::module`] has
/// somewhere to point.
pub const PRELUDE_MODULE: &str = "<prelude>";

pub struct AnalysisContext {
    pub registry: ModuleRegistry,
    pub scopes: ScopeTree,
    pub report: Report,
    pub prelude: ScopeId,
    pub project_name: String,
    pub remote_enabled: bool,
}

impl AnalysisContext {
    pub fn new(project_name: impl Into<String>, remote_enabled: bool) -> Self {
        let mut scopes = ScopeTree::default();
        let prelude_key = ModuleKey::new(PRELUDE_MODULE.to_string());
        let prelude = scopes.create(prelude_key, None);

        let prelude_scope = scopes.get_mut(prelude);
        for primitive in Primitive::ALL {
            let _ = prelude_scope.types.declare(
                primitive.name().to_string(),
                Symbol::new(primitive.name(), SymbolKind::Type, 0..0)
                    .with_type(Type::Primitive(*primitive)),
            );
        }

        Self {
            registry: ModuleRegistry::default(),
            scopes,
            report: Report::default(),
            prelude,
            project_name: project_name.into(),
            remote_enabled,
        }
    }

    /// Creates a fresh module-owned scope parented to the prelude, so every
    /// module sees primitive type names without needing its own copies.
    pub fn new_module_scope(&mut self, module: ModuleKey) -> ScopeId {
        self.scopes.create(module, Some(self.prelude))
    }

    /// Looks up a name in another module's top-level scope directly,
    /// without walking that scope's parent chain (spec.md §3.4: "lookup of
    /// a scope-qualified name `M::x` uses the import mapping, not the
    /// parent chain").
    pub fn lookup_qualified_type<'a>(&'a self, top_scope: ScopeId, name: &str) -> Option<&'a Symbol> {
        self.scope_table(top_scope).types.get(name)
    }

    pub fn lookup_qualified_value<'a>(&'a self, top_scope: ScopeId, name: &str) -> Option<&'a Symbol> {
        self.scope_table(top_scope).values.get(name)
    }

    fn scope_table(&self, id: ScopeId) -> &Scope {
        self.scopes.get(id)
    }
}

/// Maps every registered module's key to its top-level scope, for callers
/// that need a snapshot rather than repeated registry lookups (e.g. the
/// orchestrator's import-graph traversal).
pub fn module_scope_index(registry: &ModuleRegistry) -> IndexMap<ModuleKey, ScopeId> {
    registry.iter().map(|(key, module)| (key.clone(), module.top_scope)).collect()
}
