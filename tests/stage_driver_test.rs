//! End-to-end stage driver scenarios: priority deferral, dependency
//! resolution across passes, async completion and the score budget.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use symsched::{
    ExecFrame, Registry, Runtime, RuntimeConfig, Stage, Symbol, SymbolFlags, SymbolId, TaskContext,
};

type RunLog = Rc<RefCell<Vec<&'static str>>>;

fn finishing(name: &'static str, log: RunLog) -> Symbol {
    symbol(name, Stage::PreFilter, 0, log)
}

fn symbol(name: &'static str, stage: Stage, priority: i32, log: RunLog) -> Symbol {
    Symbol::new(name, stage, priority).with_handler(
        move |_task: &mut TaskContext, frame: &mut ExecFrame<'_>| {
            log.borrow_mut().push(name);
            frame.finalize();
        },
    )
}

fn create(registry: &mut Registry, task: &mut TaskContext) -> Runtime {
    Runtime::create(task, registry, &RuntimeConfig::default())
}

#[test]
fn prefilters_run_in_ascending_priority_order() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    registry.add(symbol("P10", Stage::PreFilter, 10, log.clone()));
    registry.add(symbol("P5", Stage::PreFilter, 5, log.clone()));
    registry.add(symbol("P1", Stage::PreFilter, 1, log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    let mut runtime = create(&mut registry, &mut task);

    // No session events pending beyond the pass's starting count, so
    // nothing is deferred
    assert!(!runtime.process_stage(&mut task, Stage::PreFilter).unwrap());
    assert_eq!(*log.borrow(), vec!["P1", "P5", "P10"]);

    // Second pass observes everything finished
    assert!(runtime.process_stage(&mut task, Stage::PreFilter).unwrap());
}

#[test]
fn worse_priority_is_deferred_while_events_are_pending() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    let l = log.clone();
    // The best-priority symbol suspends: it registers an async event and
    // bumps the session's pending-event count
    registry.add(Symbol::new("P1", Stage::PreFilter, 1).with_handler(
        move |task: &mut TaskContext, frame: &mut ExecFrame<'_>| {
            l.borrow_mut().push("P1");
            task.pending_events += 1;
            frame.add_async_event();
        },
    ));
    registry.add(symbol("P5", Stage::PreFilter, 5, log.clone()));
    registry.add(symbol("P10", Stage::PreFilter, 10, log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    let mut runtime = create(&mut registry, &mut task);
    let p1 = SymbolId(0);

    assert!(!runtime.process_stage(&mut task, Stage::PreFilter).unwrap());
    // Only the watermark symbol ran; the strictly worse ones were deferred
    assert_eq!(*log.borrow(), vec!["P1"]);
    assert_eq!(runtime.items_inflight(), 1);

    // The async work completes and the session drains its event
    assert_eq!(runtime.async_event_done(p1), 0);
    task.pending_events -= 1;

    assert!(!runtime.process_stage(&mut task, Stage::PreFilter).unwrap());
    assert_eq!(*log.borrow(), vec!["P1", "P5", "P10"]);
    assert!(runtime.process_stage(&mut task, Stage::PreFilter).unwrap());
}

#[test]
fn postfilters_run_high_priority_first() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    registry.add(symbol("P1", Stage::PostFilter, 1, log.clone()));
    registry.add(symbol("P10", Stage::PostFilter, 10, log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    let mut runtime = create(&mut registry, &mut task);

    runtime.process_stage(&mut task, Stage::PostFilter).unwrap();
    assert_eq!(*log.borrow(), vec!["P10", "P1"]);
}

#[test]
fn filter_symbol_waits_for_dependency() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    let l = log.clone();
    // DEP suspends, so DEPENDENT stays blocked until the async completion
    let dep = registry.add(Symbol::new("DEP", Stage::Filter, 5).with_handler(
        move |_task: &mut TaskContext, frame: &mut ExecFrame<'_>| {
            l.borrow_mut().push("DEP");
            frame.add_async_event();
        },
    ));
    registry.add(symbol("DEPENDENT", Stage::Filter, 1, log.clone()).with_deps(vec![dep]));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    let mut runtime = create(&mut registry, &mut task);

    // First pass: DEPENDENT is visited first (better priority) but blocked;
    // DEP starts and suspends
    assert!(!runtime.process_stage(&mut task, Stage::Filter).unwrap());
    assert_eq!(*log.borrow(), vec!["DEP"]);
    let state = runtime.item_state("DEPENDENT").unwrap();
    assert!(!state.started && !state.finished);

    // Still blocked while the dependency is in flight
    assert!(!runtime.process_stage(&mut task, Stage::Filter).unwrap());
    assert_eq!(*log.borrow(), vec!["DEP"]);

    runtime.async_event_done(dep);

    // First pass after the dependency finished executes the dependent
    assert!(!runtime.process_stage(&mut task, Stage::Filter).unwrap());
    assert_eq!(*log.borrow(), vec!["DEP", "DEPENDENT"]);
    assert!(runtime.process_stage(&mut task, Stage::Filter).unwrap());
}

#[test]
fn score_budget_stops_filter_scheduling() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    let l = log.clone();
    registry.add(Symbol::new("SCORER", Stage::Filter, 1).with_handler(
        move |task: &mut TaskContext, frame: &mut ExecFrame<'_>| {
            l.borrow_mut().push("SCORER");
            task.score += 10.0;
            frame.finalize();
        },
    ));
    registry.add(symbol("LATE", Stage::Filter, 5, log.clone()));
    registry.add(symbol("LATER", Stage::Filter, 9, log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    task.score_limit = Some(5.0);
    let mut runtime = create(&mut registry, &mut task);

    // The stage reports done even though LATE and LATER never ran
    assert!(runtime.process_stage(&mut task, Stage::Filter).unwrap());
    assert_eq!(*log.borrow(), vec!["SCORER"]);

    for name in ["LATE", "LATER"] {
        let state = runtime.item_state(name).unwrap();
        assert!(!state.started && !state.finished);
    }
}

#[test]
fn fine_symbols_ignore_the_score_budget() {
    let fine = SymbolFlags {
        skip_disable: false,
        fine: true,
    };
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    let l = log.clone();
    registry.add(
        Symbol::new("SCORER", Stage::Filter, 1)
            .with_flags(fine)
            .with_handler(move |task: &mut TaskContext, frame: &mut ExecFrame<'_>| {
                l.borrow_mut().push("SCORER");
                task.score += 10.0;
                frame.finalize();
            }),
    );
    registry.add(symbol("FINE", Stage::Filter, 5, log.clone()).with_flags(fine));
    registry.add(symbol("COARSE", Stage::Filter, 9, log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    task.score_limit = Some(5.0);
    let mut runtime = create(&mut registry, &mut task);

    // SCORER blows the budget, but fine-flagged symbols keep scheduling;
    // the stage only stops at the first non-fine symbol past the limit
    assert!(runtime.process_stage(&mut task, Stage::Filter).unwrap());
    assert_eq!(*log.borrow(), vec!["SCORER", "FINE", "COARSE"]);
}

#[test]
fn whitelisted_message_skips_all_stages() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    registry.add(finishing("A", log.clone()));
    registry.add(symbol("B", Stage::Filter, 0, log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    task.settings = Some(json!({ "whitelist": true }));
    let mut runtime = create(&mut registry, &mut task);

    assert!(runtime.apply_settings(&task, &registry));

    for stage in Stage::ALL {
        assert!(runtime.process_stage(&mut task, stage).unwrap());
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn settings_overlay_limits_what_runs() {
    let log: RunLog = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::new();
    registry.add(finishing("KEEP", log.clone()));
    registry.add(finishing("DROP", log.clone()));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    task.settings = Some(json!({ "symbols_enabled": ["KEEP"] }));
    let mut runtime = create(&mut registry, &mut task);

    assert!(!runtime.apply_settings(&task, &registry));
    runtime.process_stage(&mut task, Stage::PreFilter).unwrap();

    assert_eq!(*log.borrow(), vec!["KEEP"]);
    // The disabled symbol reads as already handled
    assert!(runtime.is_symbol_started("DROP"));
}

#[test]
fn async_stage_completes_after_resumption() {
    let mut registry = Registry::new();
    let id = registry.add(Symbol::new("ASYNC", Stage::Idempotent, 0).with_handler(
        |_task: &mut TaskContext, frame: &mut ExecFrame<'_>| {
            frame.add_async_event();
            frame.add_async_event();
        },
    ));

    let mut task = TaskContext::new(100).with_rng_seed(1);
    let mut runtime = create(&mut registry, &mut task);

    assert!(!runtime.process_stage(&mut task, Stage::Idempotent).unwrap());
    assert_eq!(runtime.items_inflight(), 1);

    assert_eq!(runtime.async_event_done(id), 1);
    assert_eq!(runtime.items_inflight(), 1);
    assert_eq!(runtime.async_event_done(id), 0);
    assert_eq!(runtime.items_inflight(), 0);

    assert!(runtime.process_stage(&mut task, Stage::Idempotent).unwrap());
}
