//! The process-wide module registry (spec.md §2, component **M**).

use indexmap::IndexMap;

use crate::module::{Module, ModuleKey};

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<ModuleKey, Module>,
}

impl ModuleRegistry {
    pub fn insert(&mut self, module: Module) {
        self.modules.insert(module.key.clone(), module);
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&Module> {
        self.modules.get(key)
    }

    pub fn get_mut(&mut self, key: &ModuleKey) -> Option<&mut Module> {
        self.modules.get_mut(key)
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.modules.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ModuleKey> {
        self.modules.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleKey, &Module)> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
