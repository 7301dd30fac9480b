//! Working memory for ruleweave.
//!
//! This crate provides:
//! - [`FactStore`] - Facts bucketed by concrete type, queryable by any ancestor type
//! - [`FactQuery`] - Snapshot results of a type query

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod fact_store;

pub use fact_store::{FactQuery, FactStore};
