//! Fact handles.
//!
//! A fact is any user value whose type implements [`FactType`]. The engine
//! holds facts behind a reference-counted [`Fact`] handle so the same value
//! can sit in the fact store, in join memories and in the agenda at once.
//!
//! Facts that change after assertion must do so through interior mutability
//! (`Cell`, `RefCell`) and be reported with `modified`. Borrows of that
//! interior state must be released before calling back into the engine,
//! because predicates re-read it during propagation.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::types::TypeDescriptor;

// =============================================================================
// Fact Type
// =============================================================================

/// A user type that can be asserted into working memory.
///
/// Equality drives duplicate suppression: inserting a value equal to one
/// already stored is a no-op. Types that want identity semantics should carry
/// an identifier and compare on it.
pub trait FactType: Any + fmt::Debug + PartialEq {
    /// The registered name of this type.
    const TYPE_NAME: &'static str;

    /// Names of the immediate supertypes and interfaces.
    const PARENTS: &'static [&'static str] = &[];

    /// Returns the descriptor used to register this type.
    #[must_use]
    fn descriptor() -> TypeDescriptor
    where
        Self: Sized,
    {
        TypeDescriptor::new(Self::TYPE_NAME).with_parents(Self::PARENTS.iter().copied())
    }
}

/// Object-safe view of a [`FactType`].
pub trait AnyFact: fmt::Debug {
    /// The registered type name.
    fn type_name(&self) -> &'static str;
    /// The immediate parent names.
    fn parent_names(&self) -> &'static [&'static str];
    /// Value equality across erased types.
    fn dyn_eq(&self, other: &dyn AnyFact) -> bool;
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: FactType> AnyFact for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn parent_names(&self) -> &'static [&'static str] {
        T::PARENTS
    }

    fn dyn_eq(&self, other: &dyn AnyFact) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Fact Key
// =============================================================================

/// Identity of a fact handle.
///
/// Two clones of one handle share a key; two equal values wrapped separately
/// do not. Keys are only meaningful while the fact is alive.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FactKey(usize);

impl fmt::Debug for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactKey({:#x})", self.0)
    }
}

// =============================================================================
// Fact
// =============================================================================

/// Shared handle to a working-memory value.
#[derive(Clone)]
pub struct Fact(Rc<dyn AnyFact>);

impl Fact {
    /// Wraps a value into a new fact handle.
    #[must_use]
    pub fn new<T: FactType>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Returns the identity of this handle.
    #[must_use]
    pub fn key(&self) -> FactKey {
        FactKey(Rc::as_ptr(&self.0).cast::<()>().addr())
    }

    /// Returns the registered type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Returns the descriptor of this fact's concrete type.
    #[must_use]
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::new(self.0.type_name()).with_parents(self.0.parent_names().iter().copied())
    }

    /// Downcasts to the concrete type.
    #[must_use]
    pub fn downcast_ref<T: FactType>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Returns true if the concrete type is `T`.
    #[must_use]
    pub fn is<T: FactType>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Returns true if both handles point at the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Fact) -> bool {
        self.key() == other.key()
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.dyn_eq(other.0.as_ref())
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl<T: FactType> From<T> for Fact {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
