//! Ring buffer for trace records.
//!
//! Keeps the most recent records up to a fixed size, discarding the oldest
//! when full.

use std::collections::{HashMap, VecDeque};

use super::record::{TraceEvent, TraceRecord};

// =============================================================================
// Trace Buffer
// =============================================================================

/// A bounded buffer of trace records, oldest first.
#[derive(Clone, Debug)]
pub struct TraceBuffer {
    records: VecDeque<TraceRecord>,
    max_size: usize,
    /// Next record ID to assign.
    next_id: u64,
    /// Records discarded to stay within `max_size`.
    evicted: u64,
}

impl TraceBuffer {
    /// Creates a new trace buffer with the given maximum size.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
            next_id: 0,
            evicted: 0,
        }
    }

    /// Creates a buffer with default size (10000 records).
    #[must_use]
    pub fn default_size() -> Self {
        Self::new(10000)
    }

    /// Pushes a new event to the buffer.
    ///
    /// Returns the assigned record ID.
    pub fn push(&mut self, firing: usize, timestamp_ns: u64, event: TraceEvent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.records
            .push_back(TraceRecord::new(id, firing, timestamp_ns, event));
        while self.records.len() > self.max_size {
            self.records.pop_front();
            self.evicted += 1;
        }

        id
    }

    /// Returns the number of records in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clears all records. IDs keep increasing.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Returns an iterator over all records.
    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Returns the record with `id`, if still buffered.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&TraceRecord> {
        let first = self.records.front()?.id;
        let index = usize::try_from(id.checked_sub(first)?).ok()?;
        self.records.get(index)
    }

    /// Returns the records of one firing.
    #[must_use]
    pub fn records_for_firing(&self, firing: usize) -> Vec<&TraceRecord> {
        self.records.iter().filter(|r| r.firing == firing).collect()
    }

    /// Returns the most recent N records.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&TraceRecord> {
        let start = self.records.len().saturating_sub(count);
        self.records.iter().skip(start).collect()
    }

    /// Returns records matching a predicate.
    pub fn filter<F>(&self, predicate: F) -> Vec<&TraceRecord>
    where
        F: Fn(&TraceRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Returns records of a specific event type.
    #[must_use]
    pub fn by_event_type(&self, event_type: &str) -> Vec<&TraceRecord> {
        self.filter(|r| r.event_type() == event_type)
    }

    /// Returns records concerning one rule.
    #[must_use]
    pub fn by_rule(&self, rule: &str) -> Vec<&TraceRecord> {
        self.filter(|r| r.event.rule() == rule)
    }

    /// Returns statistics about the buffer.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        let mut event_counts = HashMap::new();
        let mut rule_firings: HashMap<String, usize> = HashMap::new();
        for record in &self.records {
            *event_counts.entry(record.event_type()).or_insert(0) += 1;
            if let TraceEvent::RuleFired { rule, .. } = &record.event {
                *rule_firings.entry(rule.clone()).or_insert(0) += 1;
            }
        }

        TraceBufferStats {
            record_count: self.records.len(),
            max_size: self.max_size,
            evicted: self.evicted,
            event_counts,
            rule_firings,
        }
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::default_size()
    }
}

// =============================================================================
// Buffer Statistics
// =============================================================================

/// Statistics about a trace buffer.
#[derive(Clone, Debug)]
pub struct TraceBufferStats {
    /// Number of records currently in buffer.
    pub record_count: usize,
    /// Maximum buffer size.
    pub max_size: usize,
    /// Records discarded since creation.
    pub evicted: u64,
    /// Count of each event type.
    pub event_counts: HashMap<&'static str, usize>,
    /// Completed firings per rule.
    pub rule_firings: HashMap<String, usize>,
}
