//! Fact storage indexed by concrete type and by the type hierarchy.
//!
//! Facts live in one persistent vector per concrete type. The first time a
//! concrete type is seen its ancestor chain is computed from the hierarchy and
//! the type is recorded under every ancestor, so a query for any type is a
//! lookup plus O(1) snapshots of the matching buckets.

use std::collections::HashMap;

use im::Vector;
use ruleweave_foundation::{Fact, FactKey, TypeHierarchy, TypeId};

// =============================================================================
// Fact Store
// =============================================================================

/// Holds every currently asserted fact.
///
/// A fact is stored at most once: inserting a handle that is identical or
/// equal to a stored one is a no-op.
#[derive(Clone, Debug, Default)]
pub struct FactStore {
    /// Facts per concrete type, in insertion order.
    buckets: HashMap<TypeId, Vector<Fact>>,
    /// Concrete type of every stored handle.
    index: HashMap<FactKey, TypeId>,
    /// Concrete type by registered name, for removal by value.
    names: HashMap<&'static str, TypeId>,
    /// Cached ancestor chain (type first) of every concrete type seen.
    chains: HashMap<TypeId, Vec<TypeId>>,
    /// Concrete types seen under each ancestor, in first-seen order.
    descendants: HashMap<TypeId, Vec<TypeId>>,
    /// Number of stored facts.
    len: usize,
}

impl FactStore {
    /// Creates an empty fact store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fact under its concrete type.
    ///
    /// Returns false if an identical or equal fact is already stored.
    pub fn insert(&mut self, hierarchy: &TypeHierarchy, ty: TypeId, fact: Fact) -> bool {
        if self.index.contains_key(&fact.key()) || self.find(ty, &fact).is_some() {
            return false;
        }

        if !self.chains.contains_key(&ty) {
            let chain = hierarchy.ancestors(ty);
            for ancestor in &chain {
                self.descendants.entry(*ancestor).or_default().push(ty);
            }
            self.chains.insert(ty, chain);
        }

        self.names.insert(fact.type_name(), ty);
        self.index.insert(fact.key(), ty);
        self.buckets.entry(ty).or_default().push_back(fact);
        self.len += 1;
        true
    }

    /// Removes the stored fact equal to `fact`, returning the stored handle.
    ///
    /// The returned handle may be a different allocation from the argument
    /// when the two are only equal by value.
    pub fn take(&mut self, fact: &Fact) -> Option<Fact> {
        let ty = match self.index.get(&fact.key()) {
            Some(ty) => *ty,
            None => *self.names.get(fact.type_name())?,
        };
        let pos = self.find(ty, fact)?;
        let bucket = self.buckets.get_mut(&ty)?;
        let stored = bucket.remove(pos);
        self.index.remove(&stored.key());
        self.len -= 1;
        Some(stored)
    }

    /// Removes the stored fact equal to `fact`.
    ///
    /// Returns whether it was present.
    pub fn remove(&mut self, fact: &Fact) -> bool {
        self.take(fact).is_some()
    }

    /// Returns true if an identical or equal fact is stored.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        if self.index.contains_key(&fact.key()) {
            return true;
        }
        self.names
            .get(fact.type_name())
            .is_some_and(|ty| self.find(*ty, fact).is_some())
    }

    /// Returns the stored handle equal to `fact`, if any.
    #[must_use]
    pub fn get(&self, fact: &Fact) -> Option<&Fact> {
        let ty = match self.index.get(&fact.key()) {
            Some(ty) => *ty,
            None => *self.names.get(fact.type_name())?,
        };
        let pos = self.find(ty, fact)?;
        self.buckets.get(&ty).and_then(|b| b.get(pos))
    }

    /// Position of `fact` in the bucket of `ty`.
    ///
    /// A stored handle is located by identity only, so a different fact that
    /// has become equal to it is never picked instead.
    fn find(&self, ty: TypeId, fact: &Fact) -> Option<usize> {
        let bucket = self.buckets.get(&ty)?;
        if self.index.contains_key(&fact.key()) {
            bucket.iter().position(|f| f.ptr_eq(fact))
        } else {
            bucket.iter().position(|f| f == fact)
        }
    }

    /// Returns every fact whose concrete type is `ty` or a descendant of it.
    ///
    /// The result is a snapshot: later inserts and removals do not affect it.
    #[must_use]
    pub fn query(&self, ty: TypeId) -> FactQuery {
        let parts = self
            .descendants
            .get(&ty)
            .map(|types| {
                types
                    .iter()
                    .filter_map(|t| self.buckets.get(t))
                    .filter(|b| !b.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        FactQuery { parts }
    }

    /// Returns the number of facts assignable to `ty`.
    #[must_use]
    pub fn count_of(&self, ty: TypeId) -> usize {
        self.descendants.get(&ty).map_or(0, |types| {
            types
                .iter()
                .filter_map(|t| self.buckets.get(t))
                .map(Vector::len)
                .sum()
        })
    }

    /// Returns the cached ancestor chain of a concrete type seen so far.
    #[must_use]
    pub fn chain(&self, ty: TypeId) -> Option<&[TypeId]> {
        self.chains.get(&ty).map(Vec::as_slice)
    }

    /// Returns the total number of stored facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no fact is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over every stored fact.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.buckets.values().flat_map(Vector::iter)
    }

    /// Clears all buckets and cached chains.
    pub fn flush(&mut self) {
        self.buckets.clear();
        self.index.clear();
        self.names.clear();
        self.chains.clear();
        self.descendants.clear();
        self.len = 0;
    }
}

// =============================================================================
// Fact Query
// =============================================================================

/// Snapshot of the facts assignable to a type.
///
/// Cheap to clone; every call to [`FactQuery::iter`] restarts from the first
/// fact.
#[derive(Clone, Debug, Default)]
pub struct FactQuery {
    parts: Vec<Vector<Fact>>,
}

impl FactQuery {
    /// Iterates over the snapshot.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.parts.iter().flat_map(Vector::iter)
    }

    /// Returns the number of facts in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.iter().map(Vector::len).sum()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl IntoIterator for FactQuery {
    type Item = Fact;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Vector<Fact>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter().flatten()
    }
}
