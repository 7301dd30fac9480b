//! The conflict set (agenda) and conflict-resolution policies.
//!
//! Instantiations are kept in a `BTreeMap` ordered by the key the active
//! [`ResolutionPolicy`] assigns on insertion, with the insertion sequence as
//! the final tie-break. The first entry is always the next to fire.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ruleweave_foundation::{Error, Fact, FactKey, Result};

use crate::rule::RuleId;
use crate::token::{Bindings, Token};

// =============================================================================
// Instantiation
// =============================================================================

/// A rule together with a complete set of facts satisfying its patterns.
#[derive(Clone, Debug)]
pub struct Instantiation {
    rule: RuleId,
    rule_name: Rc<str>,
    priority: i32,
    sequence: u64,
    names: Rc<[String]>,
    token: Token,
}

impl Instantiation {
    pub(crate) fn new(
        rule: RuleId,
        rule_name: Rc<str>,
        priority: i32,
        names: Rc<[String]>,
        token: Token,
    ) -> Self {
        Self {
            rule,
            rule_name,
            priority,
            sequence: 0,
            names,
            token,
        }
    }

    /// The rule this instantiation fires.
    #[must_use]
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// The name of the rule.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    /// The rule priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Insertion order within the conflict set, starting at 1.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The bound facts in pattern order.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        self.token.facts()
    }

    /// Returns true if the identical fact handle is bound.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        self.token.contains_key(fact.key())
    }

    /// Returns the facts addressable by pattern name.
    #[must_use]
    pub fn bindings(&self) -> Bindings {
        Bindings::new(Rc::clone(&self.names), self.token.facts().to_vec())
    }
}

impl fmt::Display for Instantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.rule_name)?;
        for (i, (name, fact)) in self.names.iter().zip(self.token.facts()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={fact:?}")?;
        }
        write!(f, ")")
    }
}

// =============================================================================
// Resolution Policy
// =============================================================================

/// Ordering key assigned to an instantiation. Lower ranks fire first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Rank {
    /// Compared first.
    pub primary: i64,
    /// Compared when primaries tie.
    pub secondary: u64,
}

impl Rank {
    /// Creates a rank.
    #[must_use]
    pub const fn new(primary: i64, secondary: u64) -> Self {
        Self { primary, secondary }
    }
}

/// Decides which instantiation fires next.
///
/// The rank is computed once, when the instantiation enters the conflict
/// set; its sequence number is already assigned. Instantiations with equal
/// ranks fire in insertion order.
pub trait ResolutionPolicy {
    /// Ranks an instantiation.
    fn rank(&mut self, instantiation: &Instantiation) -> Rank;

    /// A short name for logs.
    fn name(&self) -> &'static str;
}

/// Built-in conflict-resolution strategies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// Higher priority first, then oldest first.
    #[default]
    Priority,
    /// Higher priority first, then newest first.
    PriorityRecency,
    /// Newest first, priority ignored.
    Depth,
    /// Oldest first, priority ignored.
    Breadth,
    /// Seeded pseudo-random order, priority ignored.
    Random {
        /// Seed of the generator.
        seed: u64,
    },
}

impl ConflictStrategy {
    /// Creates the policy implementing this strategy.
    #[must_use]
    pub fn policy(self) -> Box<dyn ResolutionPolicy> {
        match self {
            Self::Random { seed } => Box::new(RandomPolicy::new(seed)),
            other => Box::new(BuiltinPolicy(other)),
        }
    }
}

struct BuiltinPolicy(ConflictStrategy);

impl ResolutionPolicy for BuiltinPolicy {
    fn rank(&mut self, instantiation: &Instantiation) -> Rank {
        let priority = -i64::from(instantiation.priority());
        let sequence = instantiation.sequence();
        match self.0 {
            ConflictStrategy::PriorityRecency => Rank::new(priority, u64::MAX - sequence),
            ConflictStrategy::Depth => Rank::new(0, u64::MAX - sequence),
            ConflictStrategy::Breadth => Rank::new(0, sequence),
            ConflictStrategy::Priority | ConflictStrategy::Random { .. } => {
                Rank::new(priority, sequence)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.0 {
            ConflictStrategy::Priority => "priority",
            ConflictStrategy::PriorityRecency => "priority-recency",
            ConflictStrategy::Depth => "depth",
            ConflictStrategy::Breadth => "breadth",
            ConflictStrategy::Random { .. } => "random",
        }
    }
}

/// Reproducible random order.
struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ResolutionPolicy for RandomPolicy {
    fn rank(&mut self, _instantiation: &Instantiation) -> Rank {
        Rank::new(0, self.rng.next_u64())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

// =============================================================================
// Agenda
// =============================================================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct AgendaKey {
    rank: Rank,
    sequence: u64,
}

/// The set of fireable instantiations.
pub struct Agenda {
    entries: BTreeMap<AgendaKey, Instantiation>,
    /// Keys of the entries binding each fact.
    by_fact: HashMap<FactKey, Vec<AgendaKey>>,
    policy: Box<dyn ResolutionPolicy>,
    sequence: u64,
}

impl Agenda {
    /// Creates an empty agenda ordered by `policy`.
    #[must_use]
    pub fn new(policy: Box<dyn ResolutionPolicy>) -> Self {
        Self {
            entries: BTreeMap::new(),
            by_fact: HashMap::new(),
            policy,
            sequence: 0,
        }
    }

    /// Creates an empty agenda for a built-in strategy.
    #[must_use]
    pub fn with_strategy(strategy: ConflictStrategy) -> Self {
        Self::new(strategy.policy())
    }

    /// Adds an instantiation, returning it with its sequence assigned.
    pub fn insert(&mut self, mut instantiation: Instantiation) -> &Instantiation {
        self.sequence += 1;
        instantiation.sequence = self.sequence;
        let key = AgendaKey {
            rank: self.policy.rank(&instantiation),
            sequence: self.sequence,
        };

        for fact in instantiation.facts() {
            let keys = self.by_fact.entry(fact.key()).or_default();
            // A fact bound to several patterns indexes the entry once.
            if keys.last() != Some(&key) {
                keys.push(key);
            }
        }
        self.entries.entry(key).or_insert(instantiation)
    }

    /// Removes every instantiation binding the identical fact handle.
    ///
    /// Returns the removed instantiations in resolution order.
    pub fn remove_all_with(&mut self, fact: &Fact) -> Vec<Instantiation> {
        let Some(mut keys) = self.by_fact.remove(&fact.key()) else {
            return Vec::new();
        };
        keys.sort_unstable();
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(inst) = self.entries.remove(&key) {
                self.unindex(key, &inst, Some(fact.key()));
                removed.push(inst);
            }
        }
        removed
    }

    /// Removes and returns the next instantiation to fire.
    ///
    /// # Errors
    ///
    /// Returns `EmptyAgenda` if there is nothing to fire.
    pub fn next(&mut self) -> Result<Instantiation> {
        let (key, inst) = self.entries.pop_first().ok_or_else(Error::empty_agenda)?;
        self.unindex(key, &inst, None);
        Ok(inst)
    }

    fn unindex(&mut self, key: AgendaKey, inst: &Instantiation, skip: Option<FactKey>) {
        for fact in inst.facts() {
            let fact_key = fact.key();
            if Some(fact_key) == skip {
                continue;
            }
            if let Some(keys) = self.by_fact.get_mut(&fact_key) {
                keys.retain(|k| *k != key);
                if keys.is_empty() {
                    self.by_fact.remove(&fact_key);
                }
            }
        }
    }

    /// Returns the next instantiation to fire without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&Instantiation> {
        self.entries.values().next()
    }

    /// Iterates in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &Instantiation> {
        self.entries.values()
    }

    /// Returns the number of pending instantiations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the name of the active policy.
    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Drops every pending instantiation. The sequence counter keeps running.
    pub fn flush(&mut self) {
        self.entries.clear();
        self.by_fact.clear();
    }
}

impl Default for Agenda {
    fn default() -> Self {
        Self::with_strategy(ConflictStrategy::default())
    }
}

impl fmt::Debug for Agenda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agenda")
            .field("policy", &self.policy.name())
            .field("len", &self.entries.len())
            .finish()
    }
}
