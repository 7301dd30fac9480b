//! Ruleweave - forward-chaining production rule engine
//!
//! This crate re-exports all layers of the ruleweave system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: ruleweave_debug      - Trace records, buffer, formatters, tracer listener
//! Layer 2: ruleweave_engine     - Rule base, matching network, agenda, knowledge base
//! Layer 1: ruleweave_storage    - Fact store indexed by the type hierarchy
//! Layer 0: ruleweave_foundation - Core types (Fact, TypeHierarchy, Error)
//! ```

pub use ruleweave_debug as debug;
pub use ruleweave_engine as engine;
pub use ruleweave_foundation as foundation;
pub use ruleweave_storage as storage;
