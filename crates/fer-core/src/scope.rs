//! Lexical scopes (spec.md §3.4): a mapping from name to symbol, linked to
//! a parent scope, plus the owning module (import bindings are looked up
//! through the module, not walked through the parent chain — see
//! [`crate::module::Module::imports`]).

use crate::{collections::DeclMap, module::ModuleKey, symbol::Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

#[derive(Debug)]
pub struct Scope {
    pub module: ModuleKey,
    pub parent: Option<ScopeId>,
    pub types: DeclMap<String, Symbol>,
    pub values: DeclMap<String, Symbol>,
}

impl Scope {
    pub fn new(module: ModuleKey, parent: Option<ScopeId>) -> Self {
        Self {
            module,
            parent,
            types: DeclMap::new(),
            values: DeclMap::new(),
        }
    }
}

/// All scopes created during analysis, addressed by [`ScopeId`].
///
/// Scopes are append-only and never unwound (spec.md §9: "mutation is
/// linear during collection and never unwound"), so a flat `Vec` indexed
/// by `ScopeId` is enough; no arena crate is needed.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn create(&mut self, module: ModuleKey, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(module, parent));
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    /// Walks the parent chain looking up a type name.
    pub fn lookup_type(&self, mut scope: ScopeId, name: &str) -> Option<&Symbol> {
        loop {
            let current = self.get(scope);
            if let Some(symbol) = current.types.get(name) {
                return Some(symbol);
            }
            match current.parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    /// Walks the parent chain looking up a value (variable, function,
    /// method) name.
    pub fn lookup_value(&self, mut scope: ScopeId, name: &str) -> Option<&Symbol> {
        loop {
            let current = self.get(scope);
            if let Some(symbol) = current.values.get(name) {
                return Some(symbol);
            }
            match current.parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    /// True iff `scope` (or an ancestor up to, but not including, the
    /// module's own top scope) declares `name` as a value — used by the
    /// "scope hygiene" property: a function scope's lookups must never
    /// see a sibling function's locals.
    pub fn declares_value_locally(&self, scope: ScopeId, name: &str) -> bool {
        self.get(scope).values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{SymbolKind};

    fn key(s: &str) -> ModuleKey {
        ModuleKey::new(s.to_string())
    }

    #[test]
    fn child_scope_sees_parent_but_not_sibling() {
        let mut tree = ScopeTree::default();
        let root = tree.create(key("m"), None);
        tree.get_mut(root)
            .values
            .declare("shared".to_string(), Symbol::new("shared", SymbolKind::Var, 0..1))
            .unwrap();

        let fn_a = tree.create(key("m"), Some(root));
        tree.get_mut(fn_a)
            .values
            .declare("local_a".to_string(), Symbol::new("local_a", SymbolKind::Var, 1..2))
            .unwrap();

        let fn_b = tree.create(key("m"), Some(root));

        assert!(tree.lookup_value(fn_a, "shared").is_some());
        assert!(tree.lookup_value(fn_a, "local_a").is_some());
        assert!(tree.lookup_value(fn_b, "local_a").is_none());
    }
}
