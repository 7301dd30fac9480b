//! Rule definitions and the rule base.
//!
//! A [`Rule`] is built programmatically: it declares an ordered list of
//! patterns (a name plus a fact type), single-pattern filters, cross-pattern
//! conditions, a priority, and an action. Any front end that can produce
//! those pieces can drive the engine.
//!
//! Pattern names used by filters and conditions are resolved when the rule
//! base is compiled into the matching network; a reference that cannot be
//! resolved is a construction-time error, never a matching-time one.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use ruleweave_foundation::{Error, Fact, FactType, Result, TypeDescriptor, TypeHierarchy, TypeId};

use crate::knowledge_base::KnowledgeBase;
use crate::token::{Bindings, Refs};

/// Single-pattern predicate.
pub type FactTest = Rc<dyn Fn(&Fact) -> bool>;

/// Cross-pattern predicate over the facts a condition references.
pub type ConditionTest = Rc<dyn Fn(&Refs<'_>) -> bool>;

/// Rule action, executed with the bound facts when the rule fires.
pub type Action = Rc<dyn Fn(&mut KnowledgeBase, &Bindings) -> Result<()>>;

// =============================================================================
// Rule Id
// =============================================================================

/// Index of a rule in its rule base, assigned in declaration order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    /// Returns the raw index of this rule.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Rule
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum PatternRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for PatternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "pattern {i}"),
            Self::Name(n) => write!(f, "pattern '{n}'"),
        }
    }
}

#[derive(Clone, Debug)]
struct PatternDecl {
    name: String,
    type_name: String,
    descriptor: Option<TypeDescriptor>,
}

#[derive(Clone)]
struct FilterDecl {
    target: PatternRef,
    test: FactTest,
}

#[derive(Clone)]
struct ConditionDecl {
    refs: Vec<PatternRef>,
    test: ConditionTest,
}

/// A production rule.
#[derive(Clone)]
pub struct Rule {
    name: String,
    priority: i32,
    patterns: Vec<PatternDecl>,
    filters: Vec<FilterDecl>,
    conditions: Vec<ConditionDecl>,
    action: Option<Action>,
}

impl Rule {
    /// Creates an empty rule with priority 0.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            patterns: Vec::new(),
            filters: Vec::new(),
            conditions: Vec::new(),
            action: None,
        }
    }

    /// Sets the priority (higher fires first under the default policy).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declares the next pattern, matching facts assignable to `T`.
    ///
    /// `T`'s descriptor is registered in the type hierarchy when the rule
    /// base is compiled.
    #[must_use]
    pub fn declare<T: FactType>(mut self, name: impl Into<String>) -> Self {
        self.patterns.push(PatternDecl {
            name: name.into(),
            type_name: T::TYPE_NAME.to_string(),
            descriptor: Some(T::descriptor()),
        });
        self
    }

    /// Declares the next pattern by type name.
    ///
    /// Use this for abstract types and interfaces that have no Rust type of
    /// their own. An unknown name is registered as a root type.
    #[must_use]
    pub fn declare_type(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.patterns.push(PatternDecl {
            name: name.into(),
            type_name: type_name.into(),
            descriptor: None,
        });
        self
    }

    /// Adds a single-pattern predicate on the concrete type `T`.
    ///
    /// Facts bound to the pattern that are not a `T` fail the predicate.
    #[must_use]
    pub fn filter<T: FactType>(self, pattern: &str, test: impl Fn(&T) -> bool + 'static) -> Self {
        self.filter_fact(pattern, move |fact| {
            fact.downcast_ref::<T>().is_some_and(|value| test(value))
        })
    }

    /// Adds a single-pattern predicate on the erased fact.
    #[must_use]
    pub fn filter_fact(mut self, pattern: &str, test: impl Fn(&Fact) -> bool + 'static) -> Self {
        self.filters.push(FilterDecl {
            target: PatternRef::Name(pattern.to_string()),
            test: Rc::new(test),
        });
        self
    }

    /// Adds a cross-pattern predicate between two named patterns.
    #[must_use]
    pub fn join2<A: FactType, B: FactType>(
        self,
        a: &str,
        b: &str,
        test: impl Fn(&A, &B) -> bool + 'static,
    ) -> Self {
        self.condition_named(&[a, b], move |refs| match (refs.get::<A>(0), refs.get::<B>(1)) {
            (Some(a), Some(b)) => test(a, b),
            _ => false,
        })
    }

    /// Adds a cross-pattern predicate over named patterns.
    ///
    /// The test sees the referenced facts in the order they are named here.
    #[must_use]
    pub fn condition_named(
        mut self,
        patterns: &[&str],
        test: impl Fn(&Refs<'_>) -> bool + 'static,
    ) -> Self {
        self.conditions.push(ConditionDecl {
            refs: patterns
                .iter()
                .map(|p| PatternRef::Name((*p).to_string()))
                .collect(),
            test: Rc::new(test),
        });
        self
    }

    /// Adds a cross-pattern predicate over pattern indices.
    #[must_use]
    pub fn condition(
        mut self,
        patterns: impl IntoIterator<Item = usize>,
        test: impl Fn(&Refs<'_>) -> bool + 'static,
    ) -> Self {
        self.conditions.push(ConditionDecl {
            refs: patterns.into_iter().map(PatternRef::Index).collect(),
            test: Rc::new(test),
        });
        self
    }

    /// Sets the action executed when the rule fires.
    #[must_use]
    pub fn then(
        mut self,
        action: impl Fn(&mut KnowledgeBase, &Bindings) -> Result<()> + 'static,
    ) -> Self {
        self.action = Some(Rc::new(action));
        self
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the rule priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the number of declared patterns.
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    fn resolve(&self, target: &PatternRef) -> Result<usize> {
        match target {
            PatternRef::Index(i) if *i < self.patterns.len() => Ok(*i),
            PatternRef::Name(n) => self
                .patterns
                .iter()
                .position(|p| p.name == *n)
                .ok_or_else(|| Error::malformed_rule(&self.name, format!("unknown {target}"))),
            PatternRef::Index(_) => Err(Error::malformed_rule(
                &self.name,
                format!(
                    "{target} out of range ({} declared)",
                    self.patterns.len()
                ),
            )),
        }
    }

    /// Resolves names and types into the form the network evaluates.
    pub(crate) fn compile(&self, id: RuleId, hierarchy: &mut TypeHierarchy) -> Result<CompiledRule> {
        if self.patterns.is_empty() {
            return Err(Error::malformed_rule(&self.name, "no patterns declared"));
        }

        let mut seen = HashSet::new();
        for pattern in &self.patterns {
            if !seen.insert(pattern.name.as_str()) {
                return Err(Error::malformed_rule(
                    &self.name,
                    format!("pattern '{}' declared twice", pattern.name),
                ));
            }
        }

        let types = self
            .patterns
            .iter()
            .map(|p| match &p.descriptor {
                Some(descriptor) => hierarchy.register(descriptor),
                None => Ok(hierarchy.register_root(&p.type_name)),
            })
            .collect::<Result<Vec<TypeId>>>()?;

        let mut filters: Vec<Vec<FactTest>> = vec![Vec::new(); self.patterns.len()];
        for filter in &self.filters {
            let index = self.resolve(&filter.target)?;
            filters[index].push(Rc::clone(&filter.test));
        }

        let mut conditions: Vec<Vec<CompiledCondition>> = vec![Vec::new(); self.patterns.len()];
        for condition in &self.conditions {
            let refs = condition
                .refs
                .iter()
                .map(|r| self.resolve(r))
                .collect::<Result<Vec<usize>>>()?;
            // A condition is tested at the first join where every pattern it
            // references is bound.
            let Some(level) = refs.iter().copied().max() else {
                return Err(Error::malformed_rule(
                    &self.name,
                    "condition references no pattern",
                ));
            };
            conditions[level].push(CompiledCondition {
                refs,
                test: Rc::clone(&condition.test),
            });
        }

        Ok(CompiledRule {
            id,
            name: Rc::from(self.name.as_str()),
            priority: self.priority,
            names: self.patterns.iter().map(|p| p.name.clone()).collect(),
            types,
            filters,
            conditions,
            action: self.action.clone(),
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("patterns", &self.patterns)
            .field("filters", &self.filters.len())
            .field("conditions", &self.conditions.len())
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

// =============================================================================
// Compiled Rule
// =============================================================================

#[derive(Clone)]
pub(crate) struct CompiledCondition {
    refs: Vec<usize>,
    test: ConditionTest,
}

/// A rule with every reference resolved, as held by the network.
#[derive(Clone)]
pub(crate) struct CompiledRule {
    pub(crate) id: RuleId,
    pub(crate) name: Rc<str>,
    pub(crate) priority: i32,
    pub(crate) names: Rc<[String]>,
    pub(crate) types: Vec<TypeId>,
    filters: Vec<Vec<FactTest>>,
    /// Conditions grouped by the highest pattern index they reference.
    conditions: Vec<Vec<CompiledCondition>>,
    pub(crate) action: Option<Action>,
}

impl CompiledRule {
    /// Returns the number of declared patterns.
    pub(crate) fn arity(&self) -> usize {
        self.types.len()
    }

    /// Tests a fact against the single-pattern predicates of `pattern`.
    pub(crate) fn accepts(&self, pattern: usize, fact: &Fact) -> bool {
        self.filters[pattern].iter().all(|test| test(fact))
    }

    /// Tests the conditions that become decidable once `facts` binds
    /// patterns `0..=level`.
    pub(crate) fn joins(&self, level: usize, facts: &[Fact]) -> bool {
        self.conditions[level]
            .iter()
            .all(|c| (c.test)(&Refs::new(facts, &c.refs)))
    }
}

// =============================================================================
// Rule Base
// =============================================================================

/// The static rule set a knowledge base is built from.
#[derive(Clone, Debug, Default)]
pub struct RuleBase {
    rules: Vec<Rule>,
    types: Vec<TypeDescriptor>,
}

impl RuleBase {
    /// Creates an empty rule base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Registers a type descriptor ahead of any rule or fact.
    ///
    /// Supertypes and interfaces must be registered before the types that
    /// extend them if they have parents of their own.
    #[must_use]
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    /// Adds a rule in place.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Registers a type descriptor in place.
    pub fn add_type(&mut self, descriptor: TypeDescriptor) {
        self.types.push(descriptor);
    }

    /// Returns the rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registers every type and compiles every rule.
    pub(crate) fn compile(&self, hierarchy: &mut TypeHierarchy) -> Result<Vec<CompiledRule>> {
        for descriptor in &self.types {
            hierarchy.register(descriptor)?;
        }

        let mut names = HashSet::new();
        let mut compiled = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            if !names.insert(rule.name()) {
                return Err(Error::malformed_rule(rule.name(), "duplicate rule name"));
            }
            let id = RuleId(u32::try_from(index).map_err(|_| {
                Error::malformed_rule(rule.name(), "too many rules")
            })?);
            compiled.push(rule.compile(id, hierarchy)?);
        }
        Ok(compiled)
    }
}
