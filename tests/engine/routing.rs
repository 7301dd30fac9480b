//! Integration tests for type routing
//!
//! Tests that facts reach the patterns of their supertypes and interfaces,
//! that entry nodes are created on demand, and that unmatched types are
//! skipped.

use ruleweave_engine::{KnowledgeBase, Rule, RuleBase};
use ruleweave_foundation::{Fact, FactType, TypeDescriptor};

#[derive(Debug, PartialEq)]
struct Car(&'static str);
impl FactType for Car {
    const TYPE_NAME: &'static str = "Car";
    const PARENTS: &'static [&'static str] = &["Vehicle"];
}

#[derive(Debug, PartialEq)]
struct Boat(&'static str);
impl FactType for Boat {
    const TYPE_NAME: &'static str = "Boat";
    const PARENTS: &'static [&'static str] = &["Vehicle", "Insurable"];
}

#[derive(Debug, PartialEq)]
struct Amphibian(&'static str);
impl FactType for Amphibian {
    const TYPE_NAME: &'static str = "Amphibian";
    const PARENTS: &'static [&'static str] = &["Car", "Boat"];
}

#[derive(Debug, PartialEq)]
struct Rock;
impl FactType for Rock {
    const TYPE_NAME: &'static str = "Rock";
}

fn vehicles() -> RuleBase {
    RuleBase::new().with_rule(Rule::new("any-vehicle").declare_type("v", "Vehicle"))
}

fn rule_counts(kb: &KnowledgeBase, rule: &str) -> usize {
    kb.agenda().iter().filter(|i| i.rule_name() == rule).count()
}

// =============================================================================
// Supertype routing
// =============================================================================

#[test]
fn subtype_reaches_supertype_pattern() {
    let mut kb = KnowledgeBase::new(&vehicles()).unwrap();
    kb.insert(Car("mini")).unwrap();
    kb.insert(Boat("dinghy")).unwrap();
    assert_eq!(kb.agenda().len(), 2);
}

#[test]
fn diamond_subtype_matches_once() {
    let rules = vehicles().with_type(Car::descriptor()).with_type(Boat::descriptor());
    let mut kb = KnowledgeBase::new(&rules).unwrap();
    kb.insert(Amphibian("duck")).unwrap();
    assert_eq!(kb.agenda().len(), 1);
    assert!(kb.retract(&Fact::new(Amphibian("duck"))));
    assert!(kb.agenda().is_empty());
}

#[test]
fn interface_and_supertype_patterns_both_match() {
    // Boat must be known before Amphibian's first fact names it as a parent,
    // or it is fixed as a root.
    let rules = RuleBase::new()
        .with_type(Boat::descriptor())
        .with_rule(Rule::new("any-vehicle").declare_type("v", "Vehicle"))
        .with_rule(Rule::new("insurable").declare_type("i", "Insurable"))
        .with_rule(Rule::new("cars").declare::<Car>("c"));
    let mut kb = KnowledgeBase::new(&rules).unwrap();
    kb.insert(Amphibian("duck")).unwrap();

    assert_eq!(rule_counts(&kb, "any-vehicle"), 1);
    assert_eq!(rule_counts(&kb, "insurable"), 1);
    assert_eq!(rule_counts(&kb, "cars"), 1);
}

#[test]
fn supertype_pattern_does_not_match_siblings_of_concrete_pattern() {
    let rules = RuleBase::new().with_rule(Rule::new("boats").declare::<Boat>("b"));
    let mut kb = KnowledgeBase::new(&rules).unwrap();
    kb.insert(Car("mini")).unwrap();
    assert!(kb.agenda().is_empty());
    kb.insert(Amphibian("duck")).unwrap();
    assert_eq!(kb.agenda().len(), 1);
}

// =============================================================================
// Entry nodes
// =============================================================================

#[test]
fn entries_are_created_lazily() {
    let mut kb = KnowledgeBase::new(&vehicles()).unwrap();
    assert_eq!(kb.routed_types(), vec!["Vehicle"]);
    assert_eq!(kb.network_stats().entries, 1);

    kb.insert(Car("mini")).unwrap();
    let mut routed = kb.routed_types();
    routed.sort_unstable();
    assert_eq!(routed, vec!["Car", "Vehicle"]);
    assert_eq!(kb.network_stats().entries, 2);
}

#[test]
fn unroutable_type_is_stored_but_not_matched() {
    let mut kb = KnowledgeBase::new(&vehicles()).unwrap();
    assert!(kb.insert(Rock).unwrap());
    assert!(kb.is_unroutable("Rock"));
    assert!(kb.agenda().is_empty());
    assert_eq!(kb.objects_of::<Rock>().len(), 1);
    assert!(!kb.routed_types().contains(&"Rock"));

    assert!(kb.retract(&Fact::new(Rock)));
    assert_eq!(kb.fact_count(), 0);
}

#[test]
fn registered_type_routes_by_name() {
    #[derive(Debug, PartialEq)]
    struct Truck;
    impl FactType for Truck {
        const TYPE_NAME: &'static str = "Truck";
        const PARENTS: &'static [&'static str] = &["Vehicle"];
    }

    let mut kb = KnowledgeBase::new(&vehicles()).unwrap();
    kb.register_type(&TypeDescriptor::new("Truck").with_parent("Vehicle"))
        .unwrap();
    kb.insert(Truck).unwrap();
    assert_eq!(kb.agenda().len(), 1);
}

#[test]
fn subtype_rule_before_supertype_rule_keeps_supertype_parents() {
    let rules = RuleBase::new()
        .with_rule(Rule::new("amphibians").declare::<Amphibian>("a"))
        .with_rule(Rule::new("boats").declare::<Boat>("b"))
        .with_rule(Rule::new("insurable").declare_type("i", "Insurable"));
    let mut kb = KnowledgeBase::new(&rules).unwrap();
    kb.insert(Amphibian("duck")).unwrap();
    kb.insert(Boat("dinghy")).unwrap();

    assert_eq!(rule_counts(&kb, "amphibians"), 1);
    assert_eq!(rule_counts(&kb, "boats"), 2);
    assert_eq!(rule_counts(&kb, "insurable"), 2);
}

#[test]
fn parent_first_seen_after_build_stays_root() {
    let mut kb = KnowledgeBase::new(&vehicles()).unwrap();
    kb.insert(Amphibian("duck")).unwrap();
    assert!(kb.hierarchy().lookup("Boat").is_some());
    assert!(kb.insert(Boat("dinghy")).is_err());
}

#[test]
fn objects_query_includes_subtypes() {
    let mut kb = KnowledgeBase::new(&vehicles()).unwrap();
    kb.insert(Car("mini")).unwrap();
    kb.insert(Boat("dinghy")).unwrap();
    kb.insert(Amphibian("duck")).unwrap();
    kb.insert(Rock).unwrap();

    assert_eq!(kb.objects("Vehicle").len(), 3);
    assert_eq!(kb.objects("Car").len(), 2);
    assert_eq!(kb.objects("Insurable").len(), 2);
    assert_eq!(kb.objects_of::<Amphibian>().len(), 1);
    assert!(kb.objects("Spaceship").is_empty());
}
