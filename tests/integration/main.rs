//! Cross-layer integration tests for Ruleweave
//!
//! Tests that drive complete rule sets through the knowledge base and observe
//! them through listeners and the tracer.

mod chaining;
mod observers;
