//! Tracing of knowledge base runs.
//!
//! A [`Tracer`] implements both listener traits. Register it with
//! [`KnowledgeBase::add_listener`] and inspect its buffer after the run.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use ruleweave_debug::{Tracer, TracerConfig};
//! use ruleweave_engine::{KnowledgeBase, Rule, RuleBase};
//! use ruleweave_foundation::FactType;
//!
//! #[derive(Debug, PartialEq)]
//! struct Ping(u32);
//! impl FactType for Ping {
//!     const TYPE_NAME: &'static str = "Ping";
//! }
//!
//! let rules = RuleBase::new().with_rule(Rule::new("pong").declare::<Ping>("p"));
//! let mut kb = KnowledgeBase::new(&rules).unwrap();
//! let tracer = Rc::new(RefCell::new(Tracer::new(TracerConfig::new().enabled())));
//! kb.add_listener(tracer.clone());
//!
//! kb.insert(Ping(1)).unwrap();
//! kb.run().unwrap();
//! assert_eq!(tracer.borrow().buffer().by_event_type("rule-fired").len(), 1);
//! ```
//!
//! [`KnowledgeBase::add_listener`]: ruleweave_engine::KnowledgeBase::add_listener

pub mod buffer;
pub mod format;
pub mod record;

pub use buffer::{TraceBuffer, TraceBufferStats};
pub use format::{HumanFormatter, JsonFormatter, TraceFormatter};
pub use record::{TraceEvent, TraceRecord};

use std::io::{self, Write};
use std::time::Instant;

use ruleweave_engine::{ConflictSetListener, Instantiation, RuleEvent, RuleFireListener};

// =============================================================================
// Trace Output
// =============================================================================

/// Where trace output should be sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceOutput {
    /// No output (traces still recorded in buffer).
    #[default]
    None,
    /// Write each record to stderr as it is recorded.
    Stderr,
}

// =============================================================================
// Tracer Configuration
// =============================================================================

/// Configuration for the tracer.
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Whether tracing is enabled.
    pub enabled: bool,
    /// Maximum records to keep in buffer.
    pub buffer_size: usize,
    /// Where to output traces.
    pub output: TraceOutput,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Filter for specific event types (empty = all).
    pub event_filter: Vec<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: 10000,
            output: TraceOutput::None,
            json_format: false,
            event_filter: Vec::new(),
        }
    }
}

impl TracerConfig {
    /// Creates a new tracer configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable tracing.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Builder method to set buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Builder method to output to stderr.
    #[must_use]
    pub fn to_stderr(mut self) -> Self {
        self.output = TraceOutput::Stderr;
        self
    }

    /// Builder method to use JSON format.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Builder method to filter event types.
    #[must_use]
    pub fn filter_events(mut self, types: Vec<String>) -> Self {
        self.event_filter = types;
        self
    }
}

// =============================================================================
// Tracer
// =============================================================================

/// Records knowledge base events into a bounded buffer.
///
/// When disabled, listener callbacks return before building any event.
pub struct Tracer {
    config: TracerConfig,
    buffer: TraceBuffer,
    /// Ordinal of the latest firing seen.
    firing: usize,
    start_time: Instant,
    human_formatter: HumanFormatter,
    json_formatter: JsonFormatter,
}

impl Tracer {
    /// Creates a new tracer with the given configuration.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        let buffer_size = config.buffer_size;
        Self {
            config,
            buffer: TraceBuffer::new(buffer_size),
            firing: 0,
            start_time: Instant::now(),
            human_formatter: HumanFormatter::new().with_timestamps(),
            json_formatter: JsonFormatter::new(),
        }
    }

    /// Creates a tracer with default configuration (disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(TracerConfig::default())
    }

    /// Creates an enabled tracer that outputs to stderr.
    #[must_use]
    pub fn to_stderr() -> Self {
        Self::new(TracerConfig::new().enabled().to_stderr())
    }

    /// Returns whether tracing is enabled.
    #[must_use]
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Enables tracing.
    pub fn enable(&mut self) {
        self.config.enabled = true;
    }

    /// Disables tracing.
    pub fn disable(&mut self) {
        self.config.enabled = false;
    }

    /// Sets whether to use JSON output format.
    pub fn set_json_format(&mut self, json: bool) {
        self.config.json_format = json;
    }

    /// Sets the trace output destination.
    pub fn set_output(&mut self, output: TraceOutput) {
        self.config.output = output;
    }

    /// Records a trace event if tracing is enabled and the filter admits it.
    pub fn record(&mut self, event: TraceEvent) {
        if !self.config.enabled || !self.admits(event.event_type()) {
            return;
        }

        #[allow(clippy::cast_possible_truncation)]
        let timestamp_ns = self.start_time.elapsed().as_nanos() as u64;
        let id = self.buffer.push(self.firing, timestamp_ns, event);

        if self.config.output == TraceOutput::Stderr {
            if let Some(record) = self.buffer.get(id) {
                let line = self.format_record(record);
                let _ = writeln!(io::stderr(), "{line}");
            }
        }
    }

    /// Returns true if events of `event_type` pass the configured filter.
    fn admits(&self, event_type: &str) -> bool {
        self.config.event_filter.is_empty()
            || self.config.event_filter.iter().any(|t| t == event_type)
    }

    /// Returns true if a callback should build an event at all.
    fn wants(&self, event_type: &str) -> bool {
        self.config.enabled && self.admits(event_type)
    }

    /// Formats a record using the current format settings.
    #[must_use]
    pub fn format_record(&self, record: &TraceRecord) -> String {
        if self.config.json_format {
            self.json_formatter.format(record)
        } else {
            self.human_formatter.format(record)
        }
    }

    /// Formats multiple records.
    #[must_use]
    pub fn format_records(&self, records: &[&TraceRecord]) -> String {
        if self.config.json_format {
            self.json_formatter.format_many(records)
        } else {
            self.human_formatter.format_many(records)
        }
    }

    /// Returns the trace buffer.
    #[must_use]
    pub fn buffer(&self) -> &TraceBuffer {
        &self.buffer
    }

    /// Clears the trace buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Returns buffer statistics.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        self.buffer.stats()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RuleFireListener for Tracer {
    fn rule_firing(&mut self, event: &RuleEvent<'_>) {
        self.firing = event.firing;
        if self.wants("rule-firing") {
            self.record(TraceEvent::firing(event));
        }
    }

    fn rule_fired(&mut self, event: &RuleEvent<'_>) {
        if self.wants("rule-fired") {
            self.record(TraceEvent::fired(event));
        }
    }
}

impl ConflictSetListener for Tracer {
    fn element_added(&mut self, instantiation: &Instantiation) {
        if self.wants("instantiation-added") {
            self.record(TraceEvent::added(instantiation));
        }
    }

    fn element_removed(&mut self, instantiation: &Instantiation) {
        if self.wants("instantiation-removed") {
            self.record(TraceEvent::removed(instantiation));
        }
    }
}
