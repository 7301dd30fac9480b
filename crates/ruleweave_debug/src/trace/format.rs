//! Trace output formatters.
//!
//! Provides human-readable and JSON formatters for trace records.

use std::fmt::Write;

use super::record::{TraceEvent, TraceRecord};

// =============================================================================
// Trace Formatter Trait
// =============================================================================

/// Trait for formatting trace records.
pub trait TraceFormatter {
    /// Formats a single trace record to a string.
    fn format(&self, record: &TraceRecord) -> String;

    /// Formats multiple records.
    fn format_many(&self, records: &[&TraceRecord]) -> String {
        records
            .iter()
            .map(|r| self.format(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Human-Readable Formatter
// =============================================================================

/// Formats trace records in human-readable form.
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    /// Whether to include timestamps.
    pub show_timestamps: bool,
    /// Whether to include record IDs.
    pub show_ids: bool,
}

impl HumanFormatter {
    /// Creates a new human formatter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to show timestamps.
    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.show_timestamps = true;
        self
    }

    /// Builder method to show record IDs.
    #[must_use]
    pub fn with_ids(mut self) -> Self {
        self.show_ids = true;
        self
    }

    /// Formats timestamp in microseconds.
    #[allow(clippy::cast_precision_loss)]
    fn format_timestamp(ns: u64) -> String {
        let us = ns / 1000;
        if us >= 1_000_000 {
            format!("{:.3}s", us as f64 / 1_000_000.0)
        } else if us >= 1000 {
            format!("{:.3}ms", us as f64 / 1000.0)
        } else {
            format!("{us}us")
        }
    }

    fn bindings(bindings: &[(String, String)]) -> String {
        let parts: Vec<_> = bindings.iter().map(|(k, v)| format!("{k}={v}")).collect();
        parts.join(", ")
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let mut prefix = String::new();

        if self.show_ids {
            let _ = write!(prefix, "[{:06}] ", record.id);
        }

        let _ = write!(prefix, "F{:04} ", record.firing);

        if self.show_timestamps {
            let _ = write!(
                prefix,
                "{:>10} ",
                Self::format_timestamp(record.timestamp_ns)
            );
        }

        let event_str = match &record.event {
            TraceEvent::InstantiationAdded {
                rule,
                sequence,
                bindings,
            } => format!("  + {rule} #{sequence} {{{}}}", Self::bindings(bindings)),
            TraceEvent::InstantiationRemoved { rule, sequence } => {
                format!("  - {rule} #{sequence}")
            }
            TraceEvent::RuleFiring {
                rule,
                firing,
                bindings,
            } => format!("FIRE {firing} {rule} {{{}}}", Self::bindings(bindings)),
            TraceEvent::RuleFired { rule, firing } => format!("DONE {firing} {rule}"),
        };

        format!("{prefix}{event_str}")
    }
}

// =============================================================================
// JSON Formatter
// =============================================================================

/// Formats trace records as JSON.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    /// Whether to put each record of a list on its own line.
    pub pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method for pretty printing.
    #[must_use]
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Escapes a string for JSON.
    fn escape_string(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {
                    let _ = write!(out, "\\u{:04x}", u32::from(c));
                }
                c => out.push(c),
            }
        }
        out
    }

    fn bindings(bindings: &[(String, String)]) -> String {
        let parts: Vec<_> = bindings
            .iter()
            .map(|(k, v)| {
                format!(
                    "\"{}\":\"{}\"",
                    Self::escape_string(k),
                    Self::escape_string(v)
                )
            })
            .collect();
        format!("{{{}}}", parts.join(","))
    }
}

impl TraceFormatter for JsonFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let event_data = match &record.event {
            TraceEvent::InstantiationAdded {
                rule,
                sequence,
                bindings,
            } => format!(
                "\"rule\":\"{}\",\"sequence\":{sequence},\"bindings\":{}",
                Self::escape_string(rule),
                Self::bindings(bindings)
            ),
            TraceEvent::InstantiationRemoved { rule, sequence } => format!(
                "\"rule\":\"{}\",\"sequence\":{sequence}",
                Self::escape_string(rule)
            ),
            TraceEvent::RuleFiring {
                rule,
                firing,
                bindings,
            } => format!(
                "\"rule\":\"{}\",\"firing\":{firing},\"bindings\":{}",
                Self::escape_string(rule),
                Self::bindings(bindings)
            ),
            TraceEvent::RuleFired { rule, firing } => format!(
                "\"rule\":\"{}\",\"firing\":{firing}",
                Self::escape_string(rule)
            ),
        };

        format!(
            "{{\"id\":{},\"firing\":{},\"timestamp_ns\":{},\"type\":\"{}\",{}}}",
            record.id,
            record.firing,
            record.timestamp_ns,
            record.event_type(),
            event_data
        )
    }

    fn format_many(&self, records: &[&TraceRecord]) -> String {
        let items: Vec<_> = records.iter().map(|r| self.format(r)).collect();
        if self.pretty {
            format!("[\n  {}\n]", items.join(",\n  "))
        } else {
            format!("[{}]", items.join(","))
        }
    }
}
