//! Partial matches and the bindings handed to rule actions.

use std::rc::Rc;

use ruleweave_foundation::{Fact, FactKey, FactType};

// =============================================================================
// Token
// =============================================================================

/// An ordered tuple of facts bound to the first k patterns of a rule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Token {
    facts: Vec<Fact>,
}

impl Token {
    /// Creates a length-1 token.
    #[must_use]
    pub fn new(fact: Fact) -> Self {
        Self { facts: vec![fact] }
    }

    /// Creates a token from an ordered fact list.
    #[must_use]
    pub fn from_facts(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    /// Returns a new token with `fact` bound to the next pattern.
    #[must_use]
    pub fn extended(&self, fact: &Fact) -> Self {
        let mut facts = Vec::with_capacity(self.facts.len() + 1);
        facts.extend(self.facts.iter().cloned());
        facts.push(fact.clone());
        Self { facts }
    }

    /// Returns the bound facts in pattern order.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Consumes the token, returning its facts.
    #[must_use]
    pub fn into_facts(self) -> Vec<Fact> {
        self.facts
    }

    /// Returns true if the identical fact handle is bound in this token.
    #[must_use]
    pub fn contains_key(&self, key: FactKey) -> bool {
        self.facts.iter().any(|f| f.key() == key)
    }

    /// Returns the number of bound patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// The facts of a fired instantiation, addressable by pattern name or index.
#[derive(Clone, Debug)]
pub struct Bindings {
    names: Rc<[String]>,
    facts: Vec<Fact>,
}

impl Bindings {
    /// Creates bindings from pattern names and the matching facts.
    #[must_use]
    pub fn new(names: Rc<[String]>, facts: Vec<Fact>) -> Self {
        Self { names, facts }
    }

    /// Gets the fact bound to a pattern name.
    #[must_use]
    pub fn fact(&self, name: &str) -> Option<&Fact> {
        let index = self.names.iter().position(|n| n == name)?;
        self.facts.get(index)
    }

    /// Gets the fact bound to a pattern name as a concrete type.
    #[must_use]
    pub fn get<T: FactType>(&self, name: &str) -> Option<&T> {
        self.fact(name).and_then(Fact::downcast_ref::<T>)
    }

    /// Gets the fact bound to the pattern at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Fact> {
        self.facts.get(index)
    }

    /// Returns the bound facts in pattern order.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Iterates over `(pattern name, fact)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fact)> {
        self.names.iter().map(String::as_str).zip(self.facts.iter())
    }

    /// Returns the number of bound patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

// =============================================================================
// Refs
// =============================================================================

/// The facts a cross-pattern condition asked for, in the order it named them.
#[derive(Clone, Copy, Debug)]
pub struct Refs<'a> {
    facts: &'a [Fact],
    refs: &'a [usize],
}

impl<'a> Refs<'a> {
    pub(crate) fn new(facts: &'a [Fact], refs: &'a [usize]) -> Self {
        Self { facts, refs }
    }

    /// Gets the i-th referenced fact.
    #[must_use]
    pub fn fact(&self, i: usize) -> Option<&'a Fact> {
        self.refs.get(i).and_then(|&index| self.facts.get(index))
    }

    /// Gets the i-th referenced fact as a concrete type.
    #[must_use]
    pub fn get<T: FactType>(&self, i: usize) -> Option<&'a T> {
        self.fact(i).and_then(Fact::downcast_ref::<T>)
    }

    /// Returns the number of referenced patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns true if the condition references nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
