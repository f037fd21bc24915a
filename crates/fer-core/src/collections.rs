//! An insertion-ordered map with duplicate-declaration tracking.
//!
//! [`DeclMap`] backs every scope's name table (spec.md §3.3, §3.4). It
//! behaves like `IndexMap` except that [`DeclMap::declare`] reports a
//! conflict — with the position of the earlier declaration — instead of
//! silently overwriting, which is exactly the redeclaration check the
//! collector needs ("the first occurrence wins", spec.md §4.2).

use std::{hash::Hash, ops::Range};

use indexmap::{Equivalent, IndexMap};

/// Anything that can report where it was declared, so [`DeclMap`] can
/// surface that position in a conflict.
pub trait Located {
    fn location(&self) -> Range<usize>;
}

#[derive(Debug, Clone)]
pub struct DeclMap<K, V> {
    map: IndexMap<K, V>,
}

impl<K, V> Default for DeclMap<K, V> {
    fn default() -> Self {
        Self { map: IndexMap::new() }
    }
}

impl<K, V> DeclMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Located,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `key -> value`. If `key` is already present, returns the
    /// position of the existing declaration and leaves the map unchanged
    /// (first occurrence wins, per spec.md §4.2).
    pub fn declare(&mut self, key: K, value: V) -> Result<(), Range<usize>> {
        if let Some(existing) = self.map.get(&key) {
            return Err(existing.location());
        }
        self.map.insert(key, value);
        Ok(())
    }

    /// Inserts unconditionally, overwriting any previous value. Used for
    /// cases outside the redeclaration check (e.g. caching a resolved
    /// type back onto its symbol).
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.get_mut(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
