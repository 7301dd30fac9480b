//! Core types, errors, fact handles, and the type hierarchy for ruleweave.
//!
//! This crate provides:
//! - [`Fact`] - Shared, identity-bearing handles to working-memory values
//! - [`FactType`] - The trait user types implement to become facts
//! - [`TypeHierarchy`] - The registered supertype/interface graph
//! - [`Interner`] - Type name interning behind [`TypeId`]
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fact;
pub mod intern;
pub mod types;

pub use error::{Error, ErrorContext, ErrorKind, Result, SemanticLimit};
pub use fact::{AnyFact, Fact, FactKey, FactType};
pub use intern::{Interner, TypeId};
pub use types::{TypeDescriptor, TypeHierarchy};
