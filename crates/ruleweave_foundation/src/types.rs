//! Type descriptors and the registered type hierarchy.
//!
//! The hierarchy is an explicit table from [`TypeId`] to the ids of the
//! type's immediate supertypes and interfaces. It replaces runtime
//! introspection: entry-node wiring and fact-store indexing are lookups plus
//! graph traversal over this table.
//!
//! A type's parents are fixed the first time it is registered. A parent that
//! is only named by a child is held as an implied root until its own
//! descriptor arrives, which fills in its parents. [`TypeHierarchy::seal`]
//! ends that window: afterwards edges are only ever added from newly
//! registered types, so an ancestor chain computed after sealing stays valid
//! for the lifetime of the hierarchy.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::intern::{Interner, TypeId};

// =============================================================================
// Type Descriptor
// =============================================================================

/// A type name plus the names of its immediate supertypes and interfaces.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeDescriptor {
    /// The type name.
    pub name: String,
    /// Immediate parents, supertype first by convention.
    pub parents: Vec<String>,
}

impl TypeDescriptor {
    /// Creates a descriptor for a root type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
        }
    }

    /// Adds an immediate parent.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Adds several immediate parents.
    #[must_use]
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents.extend(parents.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parents.is_empty() {
            write!(f, " : {}", self.parents.join(", "))?;
        }
        Ok(())
    }
}

// =============================================================================
// Type Hierarchy
// =============================================================================

/// The registered supertype/interface graph.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeHierarchy {
    interner: Interner,
    /// Immediate parents, indexed by `TypeId`.
    parents: Vec<Vec<TypeId>>,
    /// Types named only as a parent so far, indexed by `TypeId`.
    #[cfg_attr(feature = "serde", serde(default))]
    implied: Vec<bool>,
}

impl TypeHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type and returns its id.
    ///
    /// Registering the same descriptor again is a no-op. Unknown parents are
    /// registered as implied roots. An implied root takes the parents of the
    /// first descriptor registered for it, unless the hierarchy is sealed.
    ///
    /// # Errors
    ///
    /// Returns `TypeRedefinition` if the type is already registered with a
    /// different parent set, and `TypeCycle` if it would become its own
    /// ancestor.
    pub fn register(&mut self, descriptor: &TypeDescriptor) -> Result<TypeId> {
        if descriptor.parents.iter().any(|p| *p == descriptor.name) {
            return Err(Error::type_cycle(&descriptor.name));
        }

        if let Some(id) = self.interner.lookup(&descriptor.name) {
            if self.is_implied(id) {
                return self.complete(id, descriptor);
            }
            let mut existing: Vec<&str> = self.parents[id.0 as usize]
                .iter()
                .filter_map(|p| self.interner.name(*p))
                .collect();
            let mut requested: Vec<&str> = descriptor.parents.iter().map(String::as_str).collect();
            existing.sort_unstable();
            existing.dedup();
            requested.sort_unstable();
            requested.dedup();
            if existing != requested {
                return Err(Error::type_redefinition(&descriptor.name));
            }
            return Ok(id);
        }

        let parents: Vec<TypeId> = descriptor
            .parents
            .iter()
            .map(|p| self.register_root(p))
            .collect();
        let id = self.intern(&descriptor.name);
        self.parents[id.0 as usize] = parents;
        Ok(id)
    }

    /// Gives an implied root the parents of its first descriptor.
    fn complete(&mut self, id: TypeId, descriptor: &TypeDescriptor) -> Result<TypeId> {
        let closes_cycle = descriptor.parents.iter().any(|p| {
            self.interner
                .lookup(p)
                .is_some_and(|pid| self.ancestors(pid).contains(&id))
        });
        if closes_cycle {
            return Err(Error::type_cycle(&descriptor.name));
        }

        let parents: Vec<TypeId> = descriptor
            .parents
            .iter()
            .map(|p| self.register_root(p))
            .collect();
        self.parents[id.0 as usize] = parents;
        self.implied[id.0 as usize] = false;
        Ok(id)
    }

    /// Registers a name as a root type if it is unknown, returning its id.
    ///
    /// A name first seen here stays an implied root until a descriptor for
    /// it is registered or the hierarchy is sealed.
    pub fn register_root(&mut self, name: &str) -> TypeId {
        let known = self.interner.lookup(name).is_some();
        let id = self.intern(name);
        if !known {
            self.implied[id.0 as usize] = true;
        }
        id
    }

    /// Fixes every implied root as a root.
    ///
    /// Call once ancestor chains start being cached.
    pub fn seal(&mut self) {
        self.implied.iter_mut().for_each(|i| *i = false);
    }

    /// Returns true if the type has only been named as a parent so far.
    #[must_use]
    pub fn is_implied(&self, id: TypeId) -> bool {
        self.implied.get(id.0 as usize).copied().unwrap_or(false)
    }

    fn intern(&mut self, name: &str) -> TypeId {
        let id = self.interner.intern(name);
        if self.parents.len() <= id.0 as usize {
            self.parents.resize_with(id.0 as usize + 1, Vec::new);
        }
        if self.implied.len() <= id.0 as usize {
            self.implied.resize(id.0 as usize + 1, false);
        }
        id
    }

    /// Looks up a registered type by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.interner.lookup(name)
    }

    /// Returns the name of a registered type.
    #[must_use]
    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.interner.name(id)
    }

    /// Returns the immediate parents of a type.
    #[must_use]
    pub fn parents(&self, id: TypeId) -> &[TypeId] {
        self.parents.get(id.0 as usize).map_or(&[], Vec::as_slice)
    }

    /// Returns the descriptor a type was registered with.
    #[must_use]
    pub fn descriptor(&self, id: TypeId) -> Option<TypeDescriptor> {
        let name = self.name(id)?;
        Some(TypeDescriptor {
            name: name.to_string(),
            parents: self
                .parents(id)
                .iter()
                .filter_map(|p| self.name(*p).map(str::to_string))
                .collect(),
        })
    }

    /// Returns the type followed by all of its transitive ancestors.
    ///
    /// Depth-first, parents in declaration order, each ancestor once.
    #[must_use]
    pub fn ancestors(&self, id: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if out.contains(&next) {
                continue;
            }
            out.push(next);
            // Reverse so the first-declared parent is visited first.
            stack.extend(self.parents(next).iter().rev().copied());
        }
        out
    }

    /// Returns true if `sub` is `sup` or one of its descendants.
    #[must_use]
    pub fn is_assignable(&self, sub: TypeId, sup: TypeId) -> bool {
        sub == sup || self.ancestors(sub).contains(&sup)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns true if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
