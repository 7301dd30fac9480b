//! Type name interning.
//!
//! Type names are interned so the hierarchy, the fact store and the matching
//! network can key everything by a small copyable [`TypeId`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interned type identifier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Returns the raw index of this type.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Interner for type names.
///
/// Maps names to dense ids and back. Ids are never reused.
/// It is not thread-safe; use external synchronization if needed.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interner {
    /// Name storage, indexed by `TypeId`.
    names: Vec<Arc<str>>,
    /// Map from name to id.
    ids: HashMap<Arc<str>, TypeId>,
}

impl Interner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a type name, returning its [`TypeId`].
    ///
    /// # Panics
    ///
    /// Panics if the number of interned names exceeds `u32::MAX`.
    pub fn intern(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }

        let id = TypeId(u32::try_from(self.names.len()).expect("too many interned types"));
        let arc: Arc<str> = name.into();
        self.names.push(Arc::clone(&arc));
        self.ids.insert(arc, id);
        id
    }

    /// Looks up a name without interning it.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.ids.get(name).copied()
    }

    /// Gets the name for an id.
    #[must_use]
    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(AsRef::as_ref)
    }

    /// Returns the number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
