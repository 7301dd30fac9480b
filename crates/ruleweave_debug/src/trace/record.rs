//! Trace event and record types.
//!
//! Events are built from listener callbacks and own everything they show, so
//! a record stays readable after its facts have been retracted.

use ruleweave_engine::{Instantiation, RuleEvent};

// =============================================================================
// Trace Event
// =============================================================================

/// Events recorded while a knowledge base runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instantiation entered the conflict set.
    InstantiationAdded {
        /// The rule name.
        rule: String,
        /// Conflict-set sequence number.
        sequence: u64,
        /// `(pattern, fact)` pairs, facts in debug form.
        bindings: Vec<(String, String)>,
    },

    /// An instantiation left the conflict set.
    InstantiationRemoved {
        /// The rule name.
        rule: String,
        /// Conflict-set sequence number.
        sequence: u64,
    },

    /// A rule is about to fire.
    RuleFiring {
        /// The rule name.
        rule: String,
        /// Firing ordinal.
        firing: usize,
        /// `(pattern, fact)` pairs, facts in debug form.
        bindings: Vec<(String, String)>,
    },

    /// A rule action returned successfully.
    RuleFired {
        /// The rule name.
        rule: String,
        /// Firing ordinal.
        firing: usize,
    },
}

fn bindings_of(instantiation: &Instantiation) -> Vec<(String, String)> {
    instantiation
        .bindings()
        .iter()
        .map(|(name, fact)| (name.to_string(), format!("{fact:?}")))
        .collect()
}

impl TraceEvent {
    /// Builds an `InstantiationAdded` event.
    #[must_use]
    pub fn added(instantiation: &Instantiation) -> Self {
        Self::InstantiationAdded {
            rule: instantiation.rule_name().to_string(),
            sequence: instantiation.sequence(),
            bindings: bindings_of(instantiation),
        }
    }

    /// Builds an `InstantiationRemoved` event.
    #[must_use]
    pub fn removed(instantiation: &Instantiation) -> Self {
        Self::InstantiationRemoved {
            rule: instantiation.rule_name().to_string(),
            sequence: instantiation.sequence(),
        }
    }

    /// Builds a `RuleFiring` event.
    #[must_use]
    pub fn firing(event: &RuleEvent<'_>) -> Self {
        Self::RuleFiring {
            rule: event.rule_name.to_string(),
            firing: event.firing,
            bindings: bindings_of(event.instantiation),
        }
    }

    /// Builds a `RuleFired` event.
    #[must_use]
    pub fn fired(event: &RuleEvent<'_>) -> Self {
        Self::RuleFired {
            rule: event.rule_name.to_string(),
            firing: event.firing,
        }
    }

    /// Returns a short name for the event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InstantiationAdded { .. } => "instantiation-added",
            Self::InstantiationRemoved { .. } => "instantiation-removed",
            Self::RuleFiring { .. } => "rule-firing",
            Self::RuleFired { .. } => "rule-fired",
        }
    }

    /// Returns the rule the event concerns.
    #[must_use]
    pub fn rule(&self) -> &str {
        match self {
            Self::InstantiationAdded { rule, .. }
            | Self::InstantiationRemoved { rule, .. }
            | Self::RuleFiring { rule, .. }
            | Self::RuleFired { rule, .. } => rule,
        }
    }

    /// Returns true if this is a fire-loop event.
    #[must_use]
    pub fn is_rule_event(&self) -> bool {
        matches!(self, Self::RuleFiring { .. } | Self::RuleFired { .. })
    }

    /// Returns true if this is a conflict-set event.
    #[must_use]
    pub fn is_agenda_event(&self) -> bool {
        matches!(
            self,
            Self::InstantiationAdded { .. } | Self::InstantiationRemoved { .. }
        )
    }
}

// =============================================================================
// Trace Record
// =============================================================================

/// A timestamped trace record.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    /// Unique record ID within the session.
    pub id: u64,
    /// Firings completed or in progress when the event occurred.
    pub firing: usize,
    /// Timestamp in nanoseconds since the tracer was created.
    pub timestamp_ns: u64,
    /// The trace event.
    pub event: TraceEvent,
}

impl TraceRecord {
    /// Creates a new trace record.
    #[must_use]
    pub fn new(id: u64, firing: usize, timestamp_ns: u64, event: TraceEvent) -> Self {
        Self {
            id,
            firing,
            timestamp_ns,
            event,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
