//! The matching network.
//!
//! Nodes live in an arena owned by [`Network`] and refer to their successors
//! by [`NodeId`]. Propagation never recurses: signals are pushed onto a work
//! queue and drained in FIFO order, so the call stack stays flat however long
//! the join chains are.
//!
//! ```text
//!  Entry(Dog) --> Entry(Animal) --> Filter(r0, p0) --> Join(r0, 1).left --> Terminal(r0)
//!                               \-> Filter(r0, p1) --> Join(r0, 1).right
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use ruleweave_foundation::{Fact, FactKey, TypeHierarchy, TypeId};

use crate::rule::{CompiledRule, RuleId};
use crate::token::Token;

// =============================================================================
// Node
// =============================================================================

/// Handle to a node in the network arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Input side of a join.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Port {
    Left,
    Right,
}

/// Successor edge of a filter or join.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Output {
    node: NodeId,
    port: Port,
}

#[derive(Clone, Debug)]
enum Node {
    /// Entry point for one type.
    Entry {
        ty: TypeId,
        /// Entries of the nearest ancestors that have one.
        forward: Vec<NodeId>,
        /// Filters of patterns declared on exactly this type.
        filters: Vec<NodeId>,
    },
    /// Single-pattern test for pattern `pattern` of rule `rule`.
    Filter {
        rule: usize,
        pattern: usize,
        output: Output,
    },
    /// Binds pattern `level` onto tokens of patterns `0..level`.
    Join {
        rule: usize,
        level: usize,
        left: Vec<Token>,
        right: Vec<Fact>,
        output: Output,
    },
    /// Turns complete tokens into matches of one rule.
    Terminal { rule: usize },
}

#[derive(Debug)]
enum Signal {
    Fact(Fact),
    Token(Token),
}

/// A complete token for a rule, ready to become an instantiation.
#[derive(Clone, Debug)]
pub(crate) struct Match {
    pub(crate) rule: RuleId,
    pub(crate) token: Token,
}

// =============================================================================
// Network Stats
// =============================================================================

/// Node counts and memory sizes of a network.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Number of entry nodes.
    pub entries: usize,
    /// Number of filter nodes.
    pub filters: usize,
    /// Number of join nodes.
    pub joins: usize,
    /// Number of terminal nodes.
    pub terminals: usize,
    /// Tokens held in left join memories.
    pub left_tokens: usize,
    /// Facts held in right join memories.
    pub right_facts: usize,
}

// =============================================================================
// Network
// =============================================================================

/// The compiled rule set plus every node and join memory.
#[derive(Clone)]
pub(crate) struct Network {
    nodes: Vec<Node>,
    entries: HashMap<TypeId, NodeId>,
    rules: Vec<CompiledRule>,
}

impl Network {
    /// Wires the compiled rules into a network.
    ///
    /// Entry nodes for every declared pattern type are created before any of
    /// them is linked, so the links do not depend on rule order.
    pub(crate) fn build(rules: Vec<CompiledRule>, hierarchy: &TypeHierarchy) -> Self {
        let mut network = Self {
            nodes: Vec::new(),
            entries: HashMap::new(),
            rules: Vec::new(),
        };

        let mut declared = Vec::new();
        for rule in &rules {
            for ty in &rule.types {
                if !network.entries.contains_key(ty) {
                    let id = network.push(Node::Entry {
                        ty: *ty,
                        forward: Vec::new(),
                        filters: Vec::new(),
                    });
                    network.entries.insert(*ty, id);
                    declared.push(*ty);
                }
            }
        }

        for ty in declared {
            let targets = network.nearest_entries(ty, hierarchy);
            let id = network.entries[&ty];
            if let Node::Entry { forward, .. } = &mut network.nodes[id.index()] {
                *forward = targets;
            }
        }

        for (index, rule) in rules.iter().enumerate() {
            network.wire(index, rule);
        }
        network.rules = rules;

        tracing::debug!(
            rules = network.rules.len(),
            nodes = network.nodes.len(),
            entries = network.entries.len(),
            "network built"
        );
        network
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("too many network nodes"));
        self.nodes.push(node);
        id
    }

    /// Builds the filter, join and terminal nodes of one rule.
    fn wire(&mut self, rule: usize, compiled: &CompiledRule) {
        let terminal = self.push(Node::Terminal { rule });
        let arity = compiled.arity();

        // Joins are created last-to-first so each knows its successor.
        let mut next = Output {
            node: terminal,
            port: Port::Left,
        };
        let mut right_inputs = vec![None; arity];
        for level in (1..arity).rev() {
            let join = self.push(Node::Join {
                rule,
                level,
                left: Vec::new(),
                right: Vec::new(),
                output: next,
            });
            right_inputs[level] = Some(Output {
                node: join,
                port: Port::Right,
            });
            next = Output {
                node: join,
                port: Port::Left,
            };
        }
        right_inputs[0] = Some(next);

        for (pattern, output) in right_inputs.into_iter().enumerate() {
            let Some(output) = output else { continue };
            let filter = self.push(Node::Filter {
                rule,
                pattern,
                output,
            });
            let entry = self.entries[&compiled.types[pattern]];
            if let Node::Entry { filters, .. } = &mut self.nodes[entry.index()] {
                filters.push(filter);
            }
        }
    }

    /// Entries of the nearest ancestors of `ty` that have one, depth-first.
    fn nearest_entries(&self, ty: TypeId, hierarchy: &TypeHierarchy) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<TypeId> = hierarchy.parents(ty).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(id) = self.entries.get(&next) {
                if !found.contains(id) {
                    found.push(*id);
                }
            } else {
                stack.extend(hierarchy.parents(next).iter().rev().copied());
            }
        }
        found
    }

    /// Returns the entry node for `ty`, creating it if an ancestor is routed.
    ///
    /// Returns `None` for unroutable types.
    pub(crate) fn entry_for(&mut self, ty: TypeId, hierarchy: &TypeHierarchy) -> Option<NodeId> {
        if let Some(id) = self.entries.get(&ty) {
            return Some(*id);
        }
        let forward = self.nearest_entries(ty, hierarchy);
        if forward.is_empty() {
            return None;
        }
        let id = self.push(Node::Entry {
            ty,
            forward,
            filters: Vec::new(),
        });
        self.entries.insert(ty, id);
        tracing::trace!(ty = ty.index(), "entry node created");
        Some(id)
    }

    /// Returns the existing entry node for `ty`.
    pub(crate) fn entry(&self, ty: TypeId) -> Option<NodeId> {
        self.entries.get(&ty).copied()
    }

    /// Filters reachable from an entry, each once.
    fn reachable_filters(&self, entry: NodeId) -> Vec<NodeId> {
        let mut filters = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![entry];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Node::Entry {
                forward,
                filters: own,
                ..
            } = &self.nodes[id.index()]
            {
                filters.extend(own.iter().copied());
                stack.extend(forward.iter().rev().copied());
            }
        }
        filters
    }

    /// Propagates a newly asserted fact and returns the completed matches.
    pub(crate) fn insert(&mut self, entry: NodeId, fact: &Fact) -> Vec<Match> {
        let mut queue: VecDeque<(NodeId, Port, Signal)> = self
            .reachable_filters(entry)
            .into_iter()
            .map(|filter| (filter, Port::Left, Signal::Fact(fact.clone())))
            .collect();
        let mut matches = Vec::new();

        let Self { nodes, rules, .. } = self;
        while let Some((id, port, signal)) = queue.pop_front() {
            match (&mut nodes[id.index()], signal) {
                (
                    Node::Filter {
                        rule,
                        pattern,
                        output,
                    },
                    Signal::Fact(fact),
                ) => {
                    let compiled = &rules[*rule];
                    if !compiled.accepts(*pattern, &fact) {
                        continue;
                    }
                    if *pattern == 0 {
                        let token = Token::new(fact);
                        if compiled.joins(0, token.facts()) {
                            queue.push_back((output.node, output.port, Signal::Token(token)));
                        }
                    } else {
                        queue.push_back((output.node, output.port, Signal::Fact(fact)));
                    }
                }
                (
                    Node::Join {
                        rule,
                        level,
                        left,
                        right,
                        output,
                    },
                    signal,
                ) => {
                    let compiled = &rules[*rule];
                    let mut emit = |token: Token| {
                        if compiled.joins(*level, token.facts()) {
                            queue.push_back((output.node, output.port, Signal::Token(token)));
                        }
                    };
                    match (port, signal) {
                        (Port::Left, Signal::Token(token)) => {
                            for fact in right.iter() {
                                emit(token.extended(fact));
                            }
                            left.push(token);
                        }
                        (Port::Right, Signal::Fact(fact)) => {
                            for token in left.iter() {
                                emit(token.extended(&fact));
                            }
                            right.push(fact);
                        }
                        (port, signal) => {
                            tracing::warn!(?port, ?signal, "signal does not fit join port");
                        }
                    }
                }
                (Node::Terminal { rule }, Signal::Token(token)) => {
                    matches.push(Match {
                        rule: rules[*rule].id,
                        token,
                    });
                }
                (node, signal) => {
                    tracing::warn!(?node, ?signal, "signal does not fit node");
                }
            }
        }
        matches
    }

    /// Purges every partial match holding `key` downstream of `entry`.
    ///
    /// Predicates are not re-evaluated: the fact may have changed since it
    /// was matched. Returns the rules whose terminals were reached.
    pub(crate) fn retract(&mut self, entry: NodeId, key: FactKey) -> Vec<RuleId> {
        let mut stack: Vec<NodeId> = self.reachable_filters(entry);
        let mut visited = HashSet::new();
        let mut reached = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            match &mut self.nodes[id.index()] {
                Node::Filter { output, .. } => stack.push(output.node),
                Node::Join {
                    left,
                    right,
                    output,
                    ..
                } => {
                    left.retain(|token| !token.contains_key(key));
                    right.retain(|fact| fact.key() != key);
                    stack.push(output.node);
                }
                Node::Terminal { rule } => reached.push(self.rules[*rule].id),
                Node::Entry { .. } => {}
            }
        }
        reached
    }

    /// Clears every join memory. Nodes and entry links are kept.
    pub(crate) fn flush(&mut self) {
        for node in &mut self.nodes {
            if let Node::Join { left, right, .. } = node {
                left.clear();
                right.clear();
            }
        }
    }

    /// Returns the compiled rule with `id`.
    pub(crate) fn rule(&self, id: RuleId) -> Option<&CompiledRule> {
        self.rules.get(id.index() as usize)
    }

    /// Returns every compiled rule in declaration order.
    pub(crate) fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Returns the type routed by each entry node.
    pub(crate) fn entry_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Entry { ty, .. } => Some(*ty),
            _ => None,
        })
    }

    /// Counts nodes and memory entries.
    pub(crate) fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        for node in &self.nodes {
            match node {
                Node::Entry { .. } => stats.entries += 1,
                Node::Filter { .. } => stats.filters += 1,
                Node::Join { left, right, .. } => {
                    stats.joins += 1;
                    stats.left_tokens += left.len();
                    stats.right_facts += right.len();
                }
                Node::Terminal { .. } => stats.terminals += 1,
            }
        }
        stats
    }
}
