//! Matching network, conflict set, and knowledge base for ruleweave.
//!
//! This crate provides:
//! - [`Rule`] / [`RuleBase`] - Programmatic rule definitions
//! - [`KnowledgeBase`] - Insert, retract, modify, and the fire loop
//! - [`Agenda`] - The conflict set, ordered by a [`ResolutionPolicy`]
//! - [`RuleFireListener`] / [`ConflictSetListener`] - Event hooks
//!
//! Facts flow from the knowledge base through entry nodes (one per routed
//! type, linked along the type hierarchy), per-pattern filter nodes and a
//! left-deep chain of join nodes to one terminal node per rule. Completed
//! matches become instantiations on the agenda.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agenda;
pub mod config;
pub mod knowledge_base;
pub mod listener;
mod network;
pub mod rule;
pub mod token;

pub use agenda::{Agenda, ConflictStrategy, Instantiation, Rank, ResolutionPolicy};
pub use config::KnowledgeBaseConfig;
pub use knowledge_base::{KnowledgeBase, RunStats};
pub use listener::{ConflictSetListener, ListenerId, RuleEvent, RuleFireListener};
pub use network::NetworkStats;
pub use rule::{Action, ConditionTest, FactTest, Rule, RuleBase, RuleId};
pub use token::{Bindings, Refs, Token};
