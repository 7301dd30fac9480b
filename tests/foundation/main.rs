//! Integration tests for Layer 0: Foundation
//!
//! Tests for errors, fact handles, and the type hierarchy.
