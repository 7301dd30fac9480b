//! Integration tests for Layer 2: Engine
//!
//! Tests for rule wiring, propagation, conflict resolution, and routing.

mod properties;
mod routing;
