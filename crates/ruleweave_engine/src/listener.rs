//! Listener interfaces for rule firings and conflict-set changes.
//!
//! Listeners are shared with the embedder as `Rc<RefCell<_>>` so their state
//! can be inspected after a run. The knowledge base only builds an event when
//! at least one listener of the matching kind is registered.

use std::cell::RefCell;
use std::rc::Rc;

use crate::agenda::Instantiation;
use crate::rule::RuleId;

/// A rule about to fire, or one that just fired.
#[derive(Clone, Copy, Debug)]
pub struct RuleEvent<'a> {
    /// The rule.
    pub rule: RuleId,
    /// The rule name.
    pub rule_name: &'a str,
    /// Ordinal of this firing over the knowledge base's lifetime, from 1.
    pub firing: usize,
    /// The instantiation being fired.
    pub instantiation: &'a Instantiation,
}

/// Observes the fire loop.
pub trait RuleFireListener {
    /// Called before the action runs.
    fn rule_firing(&mut self, _event: &RuleEvent<'_>) {}

    /// Called after the action returned successfully.
    fn rule_fired(&mut self, _event: &RuleEvent<'_>) {}
}

/// Observes the conflict set.
pub trait ConflictSetListener {
    /// Called after an instantiation entered the conflict set.
    fn element_added(&mut self, _instantiation: &Instantiation) {}

    /// Called after an instantiation left the conflict set, either because
    /// it was selected to fire or because one of its facts was retracted.
    fn element_removed(&mut self, _instantiation: &Instantiation) {}
}

/// Handle returned on registration, used to remove a listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

type Shared<L> = Rc<RefCell<L>>;

/// Registered listeners of both kinds.
#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    fire: Vec<(ListenerId, Shared<dyn RuleFireListener>)>,
    conflict: Vec<(ListenerId, Shared<dyn ConflictSetListener>)>,
}

impl Listeners {
    fn allocate(&mut self) -> ListenerId {
        self.next += 1;
        ListenerId(self.next)
    }

    pub(crate) fn add_fire(&mut self, listener: Shared<dyn RuleFireListener>) -> ListenerId {
        let id = self.allocate();
        self.fire.push((id, listener));
        id
    }

    pub(crate) fn add_conflict(&mut self, listener: Shared<dyn ConflictSetListener>) -> ListenerId {
        let id = self.allocate();
        self.conflict.push((id, listener));
        id
    }

    /// Registers one listener under both kinds with a single id.
    pub(crate) fn add_both(
        &mut self,
        fire: Shared<dyn RuleFireListener>,
        conflict: Shared<dyn ConflictSetListener>,
    ) -> ListenerId {
        let id = self.allocate();
        self.fire.push((id, fire));
        self.conflict.push((id, conflict));
        id
    }

    /// Removes every registration under `id`.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.fire.len() + self.conflict.len();
        self.fire.retain(|(other, _)| *other != id);
        self.conflict.retain(|(other, _)| *other != id);
        before != self.fire.len() + self.conflict.len()
    }

    pub(crate) fn observes_firings(&self) -> bool {
        !self.fire.is_empty()
    }

    pub(crate) fn observes_conflict_set(&self) -> bool {
        !self.conflict.is_empty()
    }

    pub(crate) fn rule_firing(&self, event: &RuleEvent<'_>) {
        for (id, listener) in &self.fire {
            match listener.try_borrow_mut() {
                Ok(mut l) => l.rule_firing(event),
                Err(_) => tracing::warn!(?id, "listener busy, rule_firing dropped"),
            }
        }
    }

    pub(crate) fn rule_fired(&self, event: &RuleEvent<'_>) {
        for (id, listener) in &self.fire {
            match listener.try_borrow_mut() {
                Ok(mut l) => l.rule_fired(event),
                Err(_) => tracing::warn!(?id, "listener busy, rule_fired dropped"),
            }
        }
    }

    pub(crate) fn element_added(&self, instantiation: &Instantiation) {
        for (id, listener) in &self.conflict {
            match listener.try_borrow_mut() {
                Ok(mut l) => l.element_added(instantiation),
                Err(_) => tracing::warn!(?id, "listener busy, element_added dropped"),
            }
        }
    }

    pub(crate) fn element_removed(&self, instantiation: &Instantiation) {
        for (id, listener) in &self.conflict {
            match listener.try_borrow_mut() {
                Ok(mut l) => l.element_removed(instantiation),
                Err(_) => tracing::warn!(?id, "listener busy, element_removed dropped"),
            }
        }
    }
}
