//! Listeners and the tracer
//!
//! Tests the event sequences a run produces and how observers attach and
//! detach.

use std::cell::RefCell;
use std::rc::Rc;

use ruleweave::debug::{JsonFormatter, TraceEvent, TraceFormatter, Tracer, TracerConfig};
use ruleweave::engine::{
    ConflictSetListener, Instantiation, KnowledgeBase, Rule, RuleBase, RuleEvent,
    RuleFireListener,
};
use ruleweave::foundation::{Error, Fact, FactType};

#[derive(Debug, PartialEq)]
struct Sensor {
    id: u32,
    reading: i32,
}
impl FactType for Sensor {
    const TYPE_NAME: &'static str = "Sensor";
}

#[derive(Debug, PartialEq)]
struct Alarm(u32);
impl FactType for Alarm {
    const TYPE_NAME: &'static str = "Alarm";
}

fn alarm_rules() -> RuleBase {
    RuleBase::new()
        .with_rule(
            Rule::new("raise")
                .declare::<Sensor>("s")
                .filter::<Sensor>("s", |s| s.reading > 100)
                .then(|kb, b| {
                    if let Some(s) = b.get::<Sensor>("s") {
                        kb.insert(Alarm(s.id))?;
                    }
                    Ok(())
                }),
        )
        .with_rule(Rule::new("acknowledge").declare::<Alarm>("a"))
}

fn traced(config: TracerConfig) -> (KnowledgeBase, Rc<RefCell<Tracer>>) {
    let mut kb = KnowledgeBase::new(&alarm_rules()).unwrap();
    let tracer = Rc::new(RefCell::new(Tracer::new(config)));
    kb.add_listener(Rc::clone(&tracer));
    (kb, tracer)
}

fn event_types(tracer: &Tracer) -> Vec<&'static str> {
    tracer.buffer().iter().map(|r| r.event_type()).collect()
}

// =============================================================================
// Tracer
// =============================================================================

#[test]
fn tracer_records_full_chain() {
    let (mut kb, tracer) = traced(TracerConfig::new().enabled());
    kb.insert(Sensor {
        id: 1,
        reading: 150,
    })
    .unwrap();
    kb.run().unwrap();

    let tracer = tracer.borrow();
    assert_eq!(
        event_types(&tracer),
        vec![
            "instantiation-added",
            "instantiation-removed",
            "rule-firing",
            "instantiation-added",
            "rule-fired",
            "instantiation-removed",
            "rule-firing",
            "rule-fired",
        ]
    );

    let stats = tracer.stats();
    assert_eq!(stats.rule_firings.get("raise"), Some(&1));
    assert_eq!(stats.rule_firings.get("acknowledge"), Some(&1));

    // The alarm was added while firing 1 was in progress.
    let during_first = tracer.buffer().records_for_firing(1);
    assert!(during_first.iter().any(|r| matches!(
        &r.event,
        TraceEvent::InstantiationAdded { rule, .. } if rule == "acknowledge"
    )));
}

#[test]
fn tracer_bindings_show_fact_debug() {
    let (mut kb, tracer) = traced(TracerConfig::new().enabled());
    kb.insert(Sensor { id: 7, reading: 101 }).unwrap();

    let tracer = tracer.borrow();
    let first = tracer.buffer().iter().next().unwrap();
    match &first.event {
        TraceEvent::InstantiationAdded { rule, bindings, .. } => {
            assert_eq!(rule, "raise");
            assert_eq!(bindings.len(), 1);
            assert_eq!(bindings[0].0, "s");
            assert!(bindings[0].1.contains("id: 7"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn tracer_filter_and_disable() {
    let config = TracerConfig::new()
        .enabled()
        .filter_events(vec!["rule-fired".to_string()]);
    let (mut kb, tracer) = traced(config);
    kb.insert(Sensor { id: 1, reading: 200 }).unwrap();
    kb.run().unwrap();
    assert_eq!(event_types(&tracer.borrow()), vec!["rule-fired", "rule-fired"]);

    tracer.borrow_mut().disable();
    kb.insert(Sensor { id: 2, reading: 200 }).unwrap();
    kb.run().unwrap();
    assert_eq!(tracer.borrow().buffer().len(), 2);
}

#[test]
fn retraction_is_traced_as_removal() {
    let (mut kb, tracer) = traced(TracerConfig::new().enabled());
    let hot = Fact::new(Sensor { id: 3, reading: 300 });
    kb.insert(hot.clone()).unwrap();
    kb.retract(&hot);

    let tracer = tracer.borrow();
    assert_eq!(
        event_types(&tracer),
        vec!["instantiation-added", "instantiation-removed"]
    );
    assert_eq!(tracer.buffer().by_rule("raise").len(), 2);
}

#[test]
fn trace_buffer_exports_as_json() {
    let (mut kb, tracer) = traced(TracerConfig::new().enabled().with_buffer_size(3));
    kb.insert(Sensor { id: 1, reading: 150 }).unwrap();
    kb.run().unwrap();

    let tracer = tracer.borrow();
    assert_eq!(tracer.buffer().len(), 3);
    assert_eq!(tracer.stats().evicted, 5);

    let records = tracer.buffer().recent(3);
    let json = JsonFormatter::new().format_many(&records);
    assert!(json.starts_with('['));
    assert!(json.contains("\"type\":\"rule-fired\""));
    assert!(json.contains("\"rule\":\"acknowledge\""));
}

#[test]
fn failed_action_has_no_fired_event() {
    let rules = RuleBase::new().with_rule(
        Rule::new("fail")
            .declare::<Alarm>("a")
            .then(|_, _| Err(Error::action("boom"))),
    );
    let mut kb = KnowledgeBase::new(&rules).unwrap();
    let tracer = Rc::new(RefCell::new(Tracer::new(TracerConfig::new().enabled())));
    kb.add_listener(Rc::clone(&tracer));

    kb.insert(Alarm(1)).unwrap();
    assert!(kb.run().is_err());
    let tracer = tracer.borrow();
    assert_eq!(tracer.buffer().by_event_type("rule-firing").len(), 1);
    assert!(tracer.buffer().by_event_type("rule-fired").is_empty());
}

// =============================================================================
// Custom listeners
// =============================================================================

#[derive(Default)]
struct Tally {
    firing: Vec<String>,
    fired: Vec<usize>,
    added: usize,
    removed: usize,
}

impl RuleFireListener for Tally {
    fn rule_firing(&mut self, event: &RuleEvent<'_>) {
        self.firing.push(event.rule_name.to_string());
    }

    fn rule_fired(&mut self, event: &RuleEvent<'_>) {
        self.fired.push(event.firing);
    }
}

impl ConflictSetListener for Tally {
    fn element_added(&mut self, _instantiation: &Instantiation) {
        self.added += 1;
    }

    fn element_removed(&mut self, _instantiation: &Instantiation) {
        self.removed += 1;
    }
}

#[test]
fn fire_and_conflict_listeners_register_separately() {
    let mut kb = KnowledgeBase::new(&alarm_rules()).unwrap();
    let fires = Rc::new(RefCell::new(Tally::default()));
    let conflicts = Rc::new(RefCell::new(Tally::default()));
    kb.add_rule_fire_listener(fires.clone());
    kb.add_conflict_set_listener(conflicts.clone());

    kb.insert(Sensor { id: 1, reading: 150 }).unwrap();
    kb.run().unwrap();

    let fires = fires.borrow();
    assert_eq!(fires.firing, vec!["raise", "acknowledge"]);
    assert_eq!(fires.fired, vec![1, 2]);
    assert_eq!(fires.added, 0);

    let conflicts = conflicts.borrow();
    assert_eq!(conflicts.added, 2);
    assert_eq!(conflicts.removed, 2);
    assert!(conflicts.firing.is_empty());
}

#[test]
fn removed_listener_sees_nothing_more() {
    let mut kb = KnowledgeBase::new(&alarm_rules()).unwrap();
    let tally = Rc::new(RefCell::new(Tally::default()));
    let id = kb.add_listener(tally.clone());

    kb.insert(Alarm(1)).unwrap();
    assert_eq!(tally.borrow().added, 1);

    assert!(kb.remove_listener(id));
    assert!(!kb.remove_listener(id));
    kb.insert(Alarm(2)).unwrap();
    kb.run().unwrap();

    let tally = tally.borrow();
    assert_eq!(tally.added, 1);
    assert!(tally.firing.is_empty());
}
