//! The knowledge base: working memory, matching network and agenda together.
//!
//! # Example
//!
//! ```
//! use ruleweave_engine::{KnowledgeBase, Rule, RuleBase};
//! use ruleweave_foundation::{Fact, FactType};
//!
//! #[derive(Debug, PartialEq)]
//! struct Order {
//!     id: u32,
//!     customer_id: u32,
//! }
//! impl FactType for Order {
//!     const TYPE_NAME: &'static str = "Order";
//! }
//!
//! #[derive(Debug, PartialEq)]
//! struct Customer {
//!     id: u32,
//! }
//! impl FactType for Customer {
//!     const TYPE_NAME: &'static str = "Customer";
//! }
//!
//! let rules = RuleBase::new().with_rule(
//!     Rule::new("large-order")
//!         .declare::<Order>("o")
//!         .declare::<Customer>("c")
//!         .filter::<Order>("o", |o| o.id >= 100)
//!         .join2::<Order, Customer>("o", "c", |o, c| o.customer_id == c.id),
//! );
//!
//! let mut kb = KnowledgeBase::new(&rules).unwrap();
//! kb.insert(Order { id: 100, customer_id: 1 }).unwrap();
//! kb.insert(Customer { id: 1 }).unwrap();
//! assert_eq!(kb.agenda().len(), 1);
//!
//! let stats = kb.run().unwrap();
//! assert_eq!(stats.fired, 1);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ruleweave_foundation::{
    Error, ErrorContext, Fact, FactType, Result, SemanticLimit, TypeDescriptor, TypeHierarchy,
    TypeId,
};
use ruleweave_storage::{FactQuery, FactStore};

use crate::agenda::{Agenda, Instantiation, ResolutionPolicy};
use crate::config::KnowledgeBaseConfig;
use crate::listener::{ConflictSetListener, ListenerId, Listeners, RuleEvent, RuleFireListener};
use crate::network::{Match, Network, NetworkStats};
use crate::rule::RuleBase;

/// Fire-loop state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Idle,
    Running,
}

/// Outcome of one call to [`KnowledgeBase::run`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Instantiations fired during the run.
    pub fired: usize,
    /// True if the run ended because an action called `halt`.
    pub halted: bool,
}

/// A forward-chaining production system instance.
///
/// Owns the fact store, the matching network and the agenda. Rule actions
/// receive `&mut KnowledgeBase` and may insert, retract, modify and halt;
/// the network and agenda are up to date before the next instantiation is
/// selected.
pub struct KnowledgeBase {
    rule_base: RuleBase,
    hierarchy: TypeHierarchy,
    store: FactStore,
    network: Network,
    agenda: Agenda,
    listeners: Listeners,
    config: KnowledgeBaseConfig,
    state: State,
    halted: bool,
    /// Firings over the lifetime of this knowledge base.
    firings: usize,
    /// Type id by fact type name, for facts seen so far.
    known: HashMap<&'static str, TypeId>,
    /// Types with no entry node reachable.
    unroutable: HashSet<TypeId>,
}

impl KnowledgeBase {
    /// Builds a knowledge base with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRule` or a type hierarchy error if the rule base
    /// cannot be wired.
    pub fn new(rule_base: &RuleBase) -> Result<Self> {
        Self::with_config(rule_base, KnowledgeBaseConfig::default())
    }

    /// Builds a knowledge base with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::new`].
    pub fn with_config(rule_base: &RuleBase, config: KnowledgeBaseConfig) -> Result<Self> {
        let policy = config.strategy.policy();
        Self::with_policy(rule_base, config, policy)
    }

    /// Builds a knowledge base ordered by a custom resolution policy.
    ///
    /// The strategy field of `config` is ignored.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::new`].
    pub fn with_policy(
        rule_base: &RuleBase,
        config: KnowledgeBaseConfig,
        policy: Box<dyn ResolutionPolicy>,
    ) -> Result<Self> {
        let mut hierarchy = TypeHierarchy::new();
        let rules = rule_base.compile(&mut hierarchy)?;
        hierarchy.seal();
        let network = Network::build(rules, &hierarchy);

        Ok(Self {
            rule_base: rule_base.clone(),
            hierarchy,
            store: FactStore::new(),
            network,
            agenda: Agenda::new(policy),
            listeners: Listeners::default(),
            config,
            state: State::Idle,
            halted: false,
            firings: 0,
            known: HashMap::new(),
            unroutable: HashSet::new(),
        })
    }

    // =========================================================================
    // Working memory
    // =========================================================================

    /// Asserts a fact.
    ///
    /// Returns false if an identical or equal fact is already present, in
    /// which case nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a type hierarchy error if the fact's type descriptor conflicts
    /// with one registered earlier.
    pub fn insert(&mut self, fact: impl Into<Fact>) -> Result<bool> {
        let fact = fact.into();
        let ty = self.type_of(&fact)?;
        if !self.store.insert(&self.hierarchy, ty, fact.clone()) {
            tracing::trace!(fact = ?fact, "duplicate fact ignored");
            return Ok(false);
        }
        self.propagate(ty, &fact);
        Ok(true)
    }

    /// Retracts a fact.
    ///
    /// Every partial match and pending instantiation holding the stored fact
    /// is removed. Returns whether the fact was present.
    pub fn retract(&mut self, fact: &Fact) -> bool {
        match self.store.take(fact) {
            Some(stored) => {
                self.purge(&stored);
                true
            }
            None => false,
        }
    }

    /// Re-evaluates a fact after its state changed.
    ///
    /// Equivalent to a retract followed by an insert of the stored handle.
    /// The insert happens even if the fact was not present.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::insert`].
    pub fn modified(&mut self, fact: &Fact) -> Result<()> {
        let target = match self.store.take(fact) {
            Some(stored) => {
                self.purge(&stored);
                stored
            }
            None => fact.clone(),
        };
        self.insert(target)?;
        Ok(())
    }

    /// Registers a type ahead of its first fact.
    ///
    /// # Errors
    ///
    /// Returns a type hierarchy error on conflicting descriptors.
    pub fn register_type(&mut self, descriptor: &TypeDescriptor) -> Result<TypeId> {
        self.hierarchy.register(descriptor)
    }

    fn type_of(&mut self, fact: &Fact) -> Result<TypeId> {
        if let Some(ty) = self.known.get(fact.type_name()) {
            return Ok(*ty);
        }
        let ty = self.hierarchy.register(&fact.descriptor())?;
        self.known.insert(fact.type_name(), ty);
        Ok(ty)
    }

    fn propagate(&mut self, ty: TypeId, fact: &Fact) {
        if self.unroutable.contains(&ty) {
            return;
        }
        let Some(entry) = self.network.entry_for(ty, &self.hierarchy) else {
            tracing::trace!(ty = fact.type_name(), "no rule matches type");
            self.unroutable.insert(ty);
            return;
        };
        for found in self.network.insert(entry, fact) {
            self.activate(found);
        }
    }

    fn activate(&mut self, found: Match) {
        let Some(rule) = self.network.rule(found.rule) else {
            return;
        };
        let instantiation = Instantiation::new(
            rule.id,
            Rc::clone(&rule.name),
            rule.priority,
            Rc::clone(&rule.names),
            found.token,
        );
        let added = self.agenda.insert(instantiation);
        tracing::trace!(rule = added.rule_name(), seq = added.sequence(), "activated");
        if self.listeners.observes_conflict_set() {
            self.listeners.element_added(added);
        }
    }

    fn purge(&mut self, stored: &Fact) {
        let entry = self
            .known
            .get(stored.type_name())
            .and_then(|ty| self.network.entry(*ty));
        if let Some(entry) = entry {
            let reached = self.network.retract(entry, stored.key());
            tracing::trace!(fact = ?stored, rules = reached.len(), "retracted from network");
        }
        for removed in self.agenda.remove_all_with(stored) {
            if self.listeners.observes_conflict_set() {
                self.listeners.element_removed(&removed);
            }
        }
    }

    // =========================================================================
    // Fire loop
    // =========================================================================

    /// Fires instantiations until the agenda is empty or an action halts.
    ///
    /// # Errors
    ///
    /// Returns `EngineRunning` if called from an action, the first action
    /// error (with the rule and firing recorded in its context), or
    /// `LimitExceeded` when the configured firing limit is reached with
    /// instantiations still pending. The failing instantiation has already
    /// left the agenda; nothing is rolled back.
    pub fn run(&mut self) -> Result<RunStats> {
        if self.state == State::Running {
            return Err(Error::engine_running("run"));
        }
        self.state = State::Running;
        self.halted = false;
        let result = self.fire_loop();
        self.state = State::Idle;
        result
    }

    fn fire_loop(&mut self) -> Result<RunStats> {
        tracing::debug!(
            pending = self.agenda.len(),
            policy = self.agenda.policy_name(),
            "run started"
        );
        let mut fired = 0;

        while !self.halted {
            if let Some(limit) = self.config.max_firings {
                if fired >= limit && !self.agenda.is_empty() {
                    let rule = self.agenda.peek().map(|i| i.rule_name().to_string());
                    return Err(Error::limit_exceeded(SemanticLimit::MaxFirings { limit, rule }));
                }
            }

            let instantiation = match self.agenda.next() {
                Ok(instantiation) => instantiation,
                Err(err) if err.is_empty_agenda() => break,
                Err(err) => return Err(err),
            };
            if self.listeners.observes_conflict_set() {
                self.listeners.element_removed(&instantiation);
            }

            fired += 1;
            self.firings += 1;
            self.fire(&instantiation)?;
        }

        let stats = RunStats {
            fired,
            halted: self.halted,
        };
        tracing::debug!(fired, halted = stats.halted, "run finished");
        Ok(stats)
    }

    fn fire(&mut self, instantiation: &Instantiation) -> Result<()> {
        let firing = self.firings;
        let rule_name = instantiation.rule_name();
        let event = || RuleEvent {
            rule: instantiation.rule(),
            rule_name,
            firing,
            instantiation,
        };
        if self.listeners.observes_firings() {
            self.listeners.rule_firing(&event());
        }
        tracing::debug!(rule = rule_name, firing, "firing");

        let action = self
            .network
            .rule(instantiation.rule())
            .and_then(|rule| rule.action.clone());
        if let Some(action) = action {
            let bindings = instantiation.bindings();
            action(self, &bindings).map_err(|err| in_rule(err, rule_name, firing))?;
        }

        if self.listeners.observes_firings() {
            self.listeners.rule_fired(&event());
        }
        Ok(())
    }

    /// Stops the current run after the action in progress returns.
    ///
    /// Has no effect outside a run.
    pub fn halt(&mut self) {
        if self.state == State::Running {
            self.halted = true;
        }
    }

    /// Returns true while `run` is executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Clears working memory, every join memory and the agenda.
    ///
    /// Rules, types and listeners are kept.
    ///
    /// # Errors
    ///
    /// Returns `EngineRunning` if called from an action.
    pub fn flush(&mut self) -> Result<()> {
        if self.state == State::Running {
            return Err(Error::engine_running("flush"));
        }
        self.store.flush();
        self.network.flush();
        self.agenda.flush();
        tracing::debug!("knowledge base flushed");
        Ok(())
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Registers a rule-fire listener.
    pub fn add_rule_fire_listener(
        &mut self,
        listener: Rc<RefCell<dyn RuleFireListener>>,
    ) -> ListenerId {
        self.listeners.add_fire(listener)
    }

    /// Registers a conflict-set listener.
    pub fn add_conflict_set_listener(
        &mut self,
        listener: Rc<RefCell<dyn ConflictSetListener>>,
    ) -> ListenerId {
        self.listeners.add_conflict(listener)
    }

    /// Registers a listener of both kinds under one id.
    pub fn add_listener<L>(&mut self, listener: Rc<RefCell<L>>) -> ListenerId
    where
        L: RuleFireListener + ConflictSetListener + 'static,
    {
        self.listeners.add_both(listener.clone(), listener)
    }

    /// Unregisters a listener. Returns whether it was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns a snapshot of the facts assignable to `type_name`.
    #[must_use]
    pub fn objects(&self, type_name: &str) -> FactQuery {
        self.hierarchy
            .lookup(type_name)
            .map(|ty| self.store.query(ty))
            .unwrap_or_default()
    }

    /// Returns a snapshot of the facts assignable to `T`.
    #[must_use]
    pub fn objects_of<T: FactType>(&self) -> FactQuery {
        self.objects(T::TYPE_NAME)
    }

    /// Returns true if an identical or equal fact is asserted.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        self.store.contains(fact)
    }

    /// Iterates over every asserted fact.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.store.iter()
    }

    /// Returns the number of asserted facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.store.len()
    }

    /// Returns the pending instantiations.
    #[must_use]
    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    /// Returns the rule base this knowledge base was built from.
    #[must_use]
    pub fn rule_base(&self) -> &RuleBase {
        &self.rule_base
    }

    /// Returns the type hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &KnowledgeBaseConfig {
        &self.config
    }

    /// Returns node counts and join memory sizes.
    #[must_use]
    pub fn network_stats(&self) -> NetworkStats {
        self.network.stats()
    }

    /// Returns the names of the types that currently have an entry node.
    #[must_use]
    pub fn routed_types(&self) -> Vec<&str> {
        self.network
            .entry_types()
            .filter_map(|ty| self.hierarchy.name(ty))
            .collect()
    }

    /// Returns true if facts of `type_name` were found to match no rule.
    #[must_use]
    pub fn is_unroutable(&self, type_name: &str) -> bool {
        self.hierarchy
            .lookup(type_name)
            .is_some_and(|ty| self.unroutable.contains(&ty))
    }

    /// Returns the rule names in declaration order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.network.rules().iter().map(|rule| &*rule.name)
    }

    /// Returns the total number of firings since creation.
    #[must_use]
    pub fn firing_count(&self) -> usize {
        self.firings
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("rules", &self.network.rules().len())
            .field("facts", &self.store.len())
            .field("agenda", &self.agenda)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Records the failing rule in an action error.
fn in_rule(mut err: Error, rule: &str, firing: usize) -> Error {
    let context = match err.context.take() {
        Some(context) if context.rule.is_some() => context.with_frame(format!("rule {rule}")),
        Some(context) => context.with_rule(rule).with_firing(firing),
        None => ErrorContext::new().with_rule(rule).with_firing(firing),
    };
    err.with_context(context)
}
