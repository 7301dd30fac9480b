//! Trace recording and formatting for ruleweave knowledge bases.
//!
//! This crate provides:
//! - [`Tracer`] - A listener that records firings and agenda changes
//! - [`TraceBuffer`] - Bounded storage for trace records
//! - [`HumanFormatter`] / [`JsonFormatter`] - Trace output

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod trace;

pub use trace::{
    HumanFormatter, JsonFormatter, TraceBuffer, TraceBufferStats, TraceEvent, TraceFormatter,
    TraceOutput, TraceRecord, Tracer, TracerConfig,
};
