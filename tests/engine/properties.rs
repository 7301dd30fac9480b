//! Property tests for propagation
//!
//! Tests that the conflict set depends only on working memory, not on the
//! order facts arrive or leave.

use std::cell::Cell;

use proptest::prelude::*;
use ruleweave_engine::{KnowledgeBase, Rule, RuleBase};
use ruleweave_foundation::{Fact, FactType};

#[derive(Debug, PartialEq)]
struct Order {
    id: u32,
    customer: u32,
}
impl FactType for Order {
    const TYPE_NAME: &'static str = "Order";
}

#[derive(Debug, PartialEq)]
struct Customer {
    id: u32,
}
impl FactType for Customer {
    const TYPE_NAME: &'static str = "Customer";
}

/// A reading whose level changes in place.
#[derive(Debug, PartialEq)]
struct Reading {
    level: Cell<u32>,
}
impl FactType for Reading {
    const TYPE_NAME: &'static str = "Reading";
}

fn rules() -> RuleBase {
    RuleBase::new().with_rule(
        Rule::new("order-customer")
            .declare::<Order>("o")
            .declare::<Customer>("c")
            .filter::<Order>("o", |o| o.id % 3 != 0)
            .join2::<Order, Customer>("o", "c", |o, c| o.customer == c.id),
    )
}

fn alarms() -> RuleBase {
    RuleBase::new().with_rule(
        Rule::new("alarm")
            .declare::<Reading>("r")
            .filter::<Reading>("r", |r| r.level.get() >= 5),
    )
}

fn facts(orders: &[(u32, u32)], customers: &[u32]) -> Vec<Fact> {
    let mut facts: Vec<Fact> = orders
        .iter()
        .map(|&(id, customer)| Fact::new(Order { id, customer }))
        .collect();
    facts.extend(customers.iter().map(|&id| Fact::new(Customer { id })));
    facts
}

/// `(order id, customer id)` pairs on the agenda, sorted.
fn matched(kb: &KnowledgeBase) -> Vec<(u32, u32)> {
    let mut pairs: Vec<(u32, u32)> = kb
        .agenda()
        .iter()
        .map(|inst| {
            let b = inst.bindings();
            (
                b.get::<Order>("o").map_or(0, |o| o.id),
                b.get::<Customer>("c").map_or(0, |c| c.id),
            )
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Applies a permutation given as sort keys.
fn permuted(facts: &[Fact], keys: &[u32]) -> Vec<Fact> {
    let mut indexed: Vec<(u32, usize)> = facts
        .iter()
        .enumerate()
        .map(|(i, _)| (keys.get(i).copied().unwrap_or(0), i))
        .collect();
    indexed.sort_unstable();
    indexed.into_iter().map(|(_, i)| facts[i].clone()).collect()
}

proptest! {
    #[test]
    fn matches_independent_of_insertion_order(
        orders in prop::collection::vec((0u32..30, 0u32..5), 0..12),
        customers in prop::collection::vec(0u32..5, 0..6),
        keys in prop::collection::vec(any::<u32>(), 18),
    ) {
        let facts = facts(&orders, &customers);

        let mut forward = KnowledgeBase::new(&rules()).unwrap();
        for fact in &facts {
            forward.insert(fact.clone()).unwrap();
        }

        let mut shuffled = KnowledgeBase::new(&rules()).unwrap();
        for fact in permuted(&facts, &keys) {
            shuffled.insert(fact).unwrap();
        }

        prop_assert_eq!(matched(&forward), matched(&shuffled));
    }

    #[test]
    fn matches_equal_brute_force(
        orders in prop::collection::vec((0u32..30, 0u32..5), 0..12),
        customers in prop::collection::vec(0u32..5, 0..6),
    ) {
        let mut kb = KnowledgeBase::new(&rules()).unwrap();
        for fact in facts(&orders, &customers) {
            kb.insert(fact).unwrap();
        }

        let mut unique_orders = orders.clone();
        unique_orders.sort_unstable();
        unique_orders.dedup();
        let mut unique_customers = customers.clone();
        unique_customers.sort_unstable();
        unique_customers.dedup();

        let mut expected = Vec::new();
        for &(id, customer) in &unique_orders {
            for &c in &unique_customers {
                if id % 3 != 0 && customer == c {
                    expected.push((id, c));
                }
            }
        }
        expected.sort_unstable();

        prop_assert_eq!(matched(&kb), expected);
    }

    #[test]
    fn retracting_everything_empties_agenda_and_memories(
        orders in prop::collection::vec((0u32..30, 0u32..5), 0..12),
        customers in prop::collection::vec(0u32..5, 0..6),
        keys in prop::collection::vec(any::<u32>(), 18),
    ) {
        let facts = facts(&orders, &customers);
        let mut kb = KnowledgeBase::new(&rules()).unwrap();
        for fact in &facts {
            kb.insert(fact.clone()).unwrap();
        }

        for fact in permuted(&facts, &keys) {
            kb.retract(&fact);
        }

        prop_assert!(kb.agenda().is_empty());
        prop_assert_eq!(kb.fact_count(), 0);
        let stats = kb.network_stats();
        prop_assert_eq!(stats.left_tokens, 0);
        prop_assert_eq!(stats.right_facts, 0);
    }

    #[test]
    fn retract_then_reinsert_restores_matches(
        orders in prop::collection::vec((0u32..30, 0u32..5), 1..12),
        customers in prop::collection::vec(0u32..5, 1..6),
        pick in any::<prop::sample::Index>(),
    ) {
        let facts = facts(&orders, &customers);
        let mut kb = KnowledgeBase::new(&rules()).unwrap();
        for fact in &facts {
            kb.insert(fact.clone()).unwrap();
        }
        let before = matched(&kb);

        let victim = pick.get(&facts).clone();
        kb.retract(&victim);
        kb.insert(victim).unwrap();

        prop_assert_eq!(matched(&kb), before);
    }

    #[test]
    fn retracting_rebuilt_values_empties_working_memory(
        orders in prop::collection::vec((0u32..30, 0u32..5), 0..12),
        customers in prop::collection::vec(0u32..5, 0..6),
        keys in prop::collection::vec(any::<u32>(), 18),
    ) {
        let mut kb = KnowledgeBase::new(&rules()).unwrap();
        for fact in facts(&orders, &customers) {
            kb.insert(fact).unwrap();
        }

        // Fresh allocations, equal by value to the stored handles.
        for fact in permuted(&facts(&orders, &customers), &keys) {
            kb.retract(&fact);
        }

        prop_assert!(kb.agenda().is_empty());
        prop_assert_eq!(kb.fact_count(), 0);
        prop_assert_eq!(kb.network_stats().right_facts, 0);
    }

    #[test]
    fn retracting_handles_after_values_collide_removes_each_handle(
        count in 2usize..8,
        level in 0u32..10,
        keys in prop::collection::vec(any::<u32>(), 8),
    ) {
        let mut kb = KnowledgeBase::new(&alarms()).unwrap();
        let readings: Vec<Fact> = (0..count)
            .map(|i| Fact::new(Reading { level: Cell::new(100 + i as u32) }))
            .collect();
        for reading in &readings {
            kb.insert(reading.clone()).unwrap();
        }
        // Every stored reading is now equal to every other one.
        for reading in &readings {
            reading.downcast_ref::<Reading>().unwrap().level.set(level);
        }

        let order = permuted(&readings, &keys);
        for (gone, reading) in order.iter().enumerate() {
            prop_assert!(kb.retract(reading));
            prop_assert!(!kb.facts().any(|f| f.ptr_eq(reading)));
            prop_assert!(!kb
                .agenda()
                .iter()
                .any(|inst| inst.facts()[0].ptr_eq(reading)));
            for kept in &order[gone + 1..] {
                prop_assert!(kb.facts().any(|f| f.ptr_eq(kept)));
            }
            prop_assert_eq!(kb.agenda().len(), count - gone - 1);
        }
        prop_assert_eq!(kb.fact_count(), 0);
    }
}
