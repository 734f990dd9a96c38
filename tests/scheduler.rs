use std::cell::RefCell;
use std::rc::Rc;

use procsim::{ProcessState, SeededSampler, Sampler, SimError, Simulation};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

type Log = Rc<RefCell<Vec<(&'static str, f64)>>>;

#[test]
fn test_events_ordered_by_time_then_schedule_order() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let log: Log = Rc::default();

    for (name, delay) in [("a", 5.), ("b", 1.), ("c", 5.), ("d", 0.)] {
        let (inner, log) = (ctx.clone(), log.clone());
        ctx.spawn(name, async move {
            inner.timeout(delay)?.await?;
            log.borrow_mut().push((name, inner.time()));
            Ok(())
        });
    }

    sim.step_until_no_events().unwrap();
    assert_eq!(*log.borrow(), vec![("d", 0.), ("b", 1.), ("a", 5.), ("c", 5.)]);
    assert_eq!(sim.time(), 5.);
}

#[test]
fn test_spawn_does_not_run_inline() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let log: Log = Rc::default();

    let inner_log = log.clone();
    let process = ctx.spawn("lazy", async move {
        inner_log.borrow_mut().push(("started", 0.));
        Ok(())
    });
    assert_eq!(process.state(), ProcessState::Created);
    assert!(log.borrow().is_empty());

    assert!(sim.step().unwrap());
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(process.state(), ProcessState::Finished);
    assert_eq!(sim.process_state(process.id()), Some(ProcessState::Finished));
}

#[test]
fn test_clock_is_monotonic() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let sampler = Rc::new(SeededSampler::new(123));
    let times = Rc::new(RefCell::new(Vec::new()));

    for i in 0..20 {
        let (inner, sampler, times) = (ctx.clone(), sampler.clone(), times.clone());
        ctx.spawn(&format!("walker {}", i), async move {
            for _ in 0..10 {
                let delay = sampler.exponential(2.);
                let due = inner.time() + delay;
                inner.timeout(delay)?.await?;
                assert!(inner.time() >= due - 1e-9);
                times.borrow_mut().push(inner.time());
            }
            Ok(())
        });
    }

    sim.step_until_no_events().unwrap();
    let times = times.borrow();
    assert_eq!(times.len(), 200);
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_run_until_horizon() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let ticks = Rc::new(RefCell::new(Vec::new()));

    let (inner, inner_ticks) = (ctx.clone(), ticks.clone());
    ctx.spawn("ticker", async move {
        loop {
            inner.timeout(1.)?.await?;
            inner_ticks.borrow_mut().push(inner.time());
        }
    });

    sim.run(Some(5.)).unwrap();
    assert_eq!(*ticks.borrow(), vec![1., 2., 3., 4.]);
    assert_eq!(sim.time(), 5.);

    sim.run(Some(7.5)).unwrap();
    assert_eq!(ticks.borrow().len(), 7);
    assert_eq!(sim.time(), 7.5);

    assert!(sim.step_for_duration(1.).unwrap());
    assert_eq!(sim.time(), 8.5);
    assert_eq!(ticks.borrow().len(), 8);

    assert_eq!(sim.run(Some(3.)), Err(SimError::PastEvent { time: 3., now: 8.5 }));
}

#[test]
fn test_run_without_horizon_stops_when_queue_is_empty() {
    let mut sim = Simulation::new();
    assert_eq!(sim.step(), Ok(false));
    sim.run(None).unwrap();
    assert_eq!(sim.time(), 0.);
    assert_eq!(sim.event_count(), 0);
}

#[test]
fn test_invalid_timeout() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    assert_eq!(ctx.timeout(-1.).err(), Some(SimError::InvalidDuration { duration: -1. }));
    assert!(ctx.timeout(f64::NAN).is_err());
    assert!(ctx.timeout(0.).is_ok());
    sim.step_until_no_events().unwrap();
}

#[test]
fn test_scheduling_in_the_past_aborts_run() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let result = Rc::new(RefCell::new(None));

    let (inner, inner_result) = (ctx.clone(), result.clone());
    ctx.spawn("time traveller", async move {
        inner.timeout(10.)?.await?;
        *inner_result.borrow_mut() = Some(inner.timeout_at(5.).err());
        Ok(())
    });

    let error = sim.step_until_no_events().unwrap_err();
    assert_eq!(error, SimError::PastEvent { time: 5., now: 10. });
    assert_eq!(*result.borrow(), Some(Some(error)));
    assert_eq!(sim.time(), 10.);
}

#[test]
fn test_timeout_at() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let inner = ctx.clone();
    ctx.spawn("waiter", async move {
        inner.timeout(1.)?.await?;
        inner.timeout_at(4.)?.await?;
        assert_eq!(inner.time(), 4.);
        inner.timeout_at(4.)?.await?;
        Ok(())
    });
    sim.step_until_no_events().unwrap();
    assert_eq!(sim.time(), 4.);
    assert!(sim.failures().is_empty());
}

#[test]
fn test_event_resumes_waiters_in_order() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let log: Log = Rc::default();
    let gate = ctx.event();

    for name in ["first", "second", "third"] {
        let (inner, gate, log) = (ctx.clone(), gate.clone(), log.clone());
        ctx.spawn(name, async move {
            gate.wait().await?;
            log.borrow_mut().push((name, inner.time()));
            Ok(())
        });
    }
    let (inner, opener_gate) = (ctx.clone(), gate.clone());
    ctx.spawn("opener", async move {
        inner.timeout(3.)?.await?;
        assert!(opener_gate.succeed());
        assert!(!opener_gate.succeed());
        Ok(())
    });
    let (inner, late_gate, late_log) = (ctx.clone(), gate.clone(), log.clone());
    ctx.spawn("late", async move {
        inner.timeout(4.)?.await?;
        late_gate.await?;
        late_log.borrow_mut().push(("late", inner.time()));
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert!(gate.is_processed());
    assert_eq!(
        *log.borrow(),
        vec![("first", 3.), ("second", 3.), ("third", 3.), ("late", 4.)]
    );
}

#[test]
fn test_failed_event() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let broken = ctx.event();
    let result = Rc::new(RefCell::new(None));

    let (waiting, inner_result) = (broken.clone(), result.clone());
    ctx.spawn("waiter", async move {
        *inner_result.borrow_mut() = Some(waiting.wait().await);
        Ok(())
    });
    broken.fail(SimError::InvalidDuration { duration: -2. });

    sim.step_until_no_events().unwrap();
    assert_eq!(
        *result.borrow(),
        Some(Err(SimError::InvalidDuration { duration: -2. }))
    );
}
