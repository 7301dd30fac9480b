//! Forward chaining
//!
//! Rules whose actions assert, modify and retract facts that other rules
//! match, plus the controls that bound a run.

use std::cell::Cell;

use ruleweave::engine::{ConflictStrategy, KnowledgeBase, KnowledgeBaseConfig, Rule, RuleBase};
use ruleweave::foundation::{ErrorKind, Fact, FactType, SemanticLimit};

// =============================================================================
// Fibonacci
// =============================================================================

const UNKNOWN: u64 = 0;

#[derive(Debug)]
struct Fibonacci {
    sequence: u32,
    value: Cell<u64>,
}

// One fact per position, whatever its value.
impl PartialEq for Fibonacci {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl FactType for Fibonacci {
    const TYPE_NAME: &'static str = "Fibonacci";
}

impl Fibonacci {
    fn unknown(sequence: u32) -> Self {
        Self {
            sequence,
            value: Cell::new(UNKNOWN),
        }
    }

    fn is_known(&self) -> bool {
        self.value.get() != UNKNOWN
    }
}

/// Asks for each predecessor, seeds the first two, then adds upward.
///
/// `go-down` refires whenever a position is modified; the repeated insert is
/// a duplicate and changes nothing.
fn fibonacci_rules() -> RuleBase {
    RuleBase::new()
        .with_rule(
            Rule::new("go-down")
                .with_priority(10)
                .declare::<Fibonacci>("f")
                .filter::<Fibonacci>("f", |f| f.sequence > 1)
                .then(|kb, b| {
                    if let Some(f) = b.get::<Fibonacci>("f") {
                        kb.insert(Fibonacci::unknown(f.sequence - 1))?;
                    }
                    Ok(())
                }),
        )
        .with_rule(
            Rule::new("base-case")
                .with_priority(5)
                .declare::<Fibonacci>("f")
                .filter::<Fibonacci>("f", |f| !f.is_known() && f.sequence <= 2)
                .then(|kb, b| {
                    if let (Some(fact), Some(f)) = (b.fact("f"), b.get::<Fibonacci>("f")) {
                        f.value.set(1);
                        kb.modified(fact)?;
                    }
                    Ok(())
                }),
        )
        .with_rule(
            Rule::new("go-up")
                .declare::<Fibonacci>("f1")
                .declare::<Fibonacci>("f2")
                .declare::<Fibonacci>("f3")
                .filter::<Fibonacci>("f1", Fibonacci::is_known)
                .filter::<Fibonacci>("f2", Fibonacci::is_known)
                .filter::<Fibonacci>("f3", |f| !f.is_known())
                .join2::<Fibonacci, Fibonacci>("f1", "f2", |a, b| a.sequence + 1 == b.sequence)
                .join2::<Fibonacci, Fibonacci>("f2", "f3", |a, b| a.sequence + 1 == b.sequence)
                .then(|kb, b| {
                    if let (Some(f1), Some(f2), Some(fact), Some(f3)) = (
                        b.get::<Fibonacci>("f1"),
                        b.get::<Fibonacci>("f2"),
                        b.fact("f3"),
                        b.get::<Fibonacci>("f3"),
                    ) {
                        f3.value.set(f1.value.get() + f2.value.get());
                        kb.modified(fact)?;
                    }
                    Ok(())
                }),
        )
}

fn value_of(kb: &KnowledgeBase, sequence: u32) -> Option<u64> {
    kb.objects_of::<Fibonacci>()
        .iter()
        .filter_map(|f| f.downcast_ref::<Fibonacci>())
        .find(|f| f.sequence == sequence)
        .map(|f| f.value.get())
}

#[test]
fn fibonacci_by_forward_chaining() {
    let mut kb = KnowledgeBase::new(&fibonacci_rules()).unwrap();
    kb.insert(Fibonacci::unknown(20)).unwrap();

    let stats = kb.run().unwrap();
    assert!(!stats.halted);
    assert_eq!(stats.fired, kb.firing_count());
    assert_eq!(kb.fact_count(), 20);
    assert_eq!(value_of(&kb, 1), Some(1));
    assert_eq!(value_of(&kb, 10), Some(55));
    assert_eq!(value_of(&kb, 20), Some(6765));
    assert!(kb.agenda().is_empty());
}

#[test]
fn fibonacci_result_does_not_depend_on_strategy() {
    for strategy in [
        ConflictStrategy::Priority,
        ConflictStrategy::PriorityRecency,
        ConflictStrategy::Depth,
        ConflictStrategy::Breadth,
        ConflictStrategy::Random { seed: 3 },
    ] {
        let config = KnowledgeBaseConfig::new().with_strategy(strategy);
        let mut kb = KnowledgeBase::with_config(&fibonacci_rules(), config).unwrap();
        kb.insert(Fibonacci::unknown(12)).unwrap();
        kb.run().unwrap();
        assert_eq!(value_of(&kb, 12), Some(144), "{strategy:?}");
    }
}

// =============================================================================
// Run controls
// =============================================================================

#[derive(Debug, PartialEq)]
struct Tick(u32);
impl FactType for Tick {
    const TYPE_NAME: &'static str = "Tick";
}

/// Each tick replaces itself with its successor, forever.
fn clock(stop_at: Option<u32>) -> RuleBase {
    RuleBase::new().with_rule(Rule::new("advance").declare::<Tick>("t").then(
        move |kb, b| {
            let (Some(fact), Some(tick)) = (b.fact("t"), b.get::<Tick>("t")) else {
                return Ok(());
            };
            if stop_at == Some(tick.0) {
                kb.halt();
                return Ok(());
            }
            let next = tick.0 + 1;
            kb.retract(fact);
            kb.insert(Tick(next))?;
            Ok(())
        },
    ))
}

#[test]
fn halt_stops_after_current_action() {
    let mut kb = KnowledgeBase::new(&clock(Some(5))).unwrap();
    kb.insert(Tick(0)).unwrap();

    let stats = kb.run().unwrap();
    assert!(stats.halted);
    assert_eq!(stats.fired, 6);
    assert!(kb.contains(&Fact::new(Tick(5))));
    assert!(!kb.is_running());
}

#[test]
fn firing_limit_bounds_runaway_rules() {
    let config = KnowledgeBaseConfig::new().with_max_firings(50);
    let mut kb = KnowledgeBase::with_config(&clock(None), config).unwrap();
    kb.insert(Tick(0)).unwrap();

    let err = kb.run().unwrap_err();
    match err.kind {
        ErrorKind::LimitExceeded(SemanticLimit::MaxFirings { limit, rule }) => {
            assert_eq!(limit, 50);
            assert_eq!(rule.as_deref(), Some("advance"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(kb.firing_count(), 50);
    assert!(kb.contains(&Fact::new(Tick(50))));

    // A later run continues from where the limit stopped.
    let err = kb.run().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LimitExceeded(_)));
    assert_eq!(kb.firing_count(), 100);
}

#[test]
fn action_error_stops_run_and_names_rule() {
    let rules = RuleBase::new().with_rule(Rule::new("explode").declare::<Tick>("t").then(
        |_, b| match b.get::<Tick>("t") {
            Some(Tick(3)) => Err(ruleweave::foundation::Error::action("tick three")),
            _ => Ok(()),
        },
    ));
    let mut kb = KnowledgeBase::new(&rules).unwrap();
    for n in 1..=5 {
        kb.insert(Tick(n)).unwrap();
    }

    let err = kb.run().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Action(ref m) if m == "tick three"));
    let context = err.context.as_ref().unwrap();
    assert_eq!(context.rule.as_deref(), Some("explode"));
    assert_eq!(context.firing, Some(3));
    assert_eq!(kb.firing_count(), 3);
    assert_eq!(kb.agenda().len(), 2);
}
