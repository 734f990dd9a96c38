use std::cell::{Cell, RefCell};
use std::rc::Rc;

use procsim::{ProcessState, SimError, Simulation};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_invalid_timeout_fails_only_its_process() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");

    let inner = ctx.clone();
    let faulty = ctx.spawn("faulty", async move {
        inner.timeout(1.)?.await?;
        inner.timeout(-1.)?.await?;
        Ok(())
    });
    let inner = ctx.clone();
    let healthy = ctx.spawn("healthy", async move {
        inner.timeout(5.)?.await?;
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(faulty.state(), ProcessState::Failed);
    assert_eq!(healthy.state(), ProcessState::Finished);
    assert_eq!(sim.time(), 5.);

    let failures = sim.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].process, faulty.id());
    assert_eq!(failures[0].name, "faulty");
    assert_eq!(failures[0].time, 1.);
}

#[test]
fn test_joiner_receives_failure() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let result = Rc::new(RefCell::new(None));

    let inner = ctx.clone();
    let faulty = ctx.spawn("faulty", async move {
        inner.timeout(2.)?.await?;
        Err("boom".into())
    });
    let (inner, inner_result, handle) = (ctx.clone(), result.clone(), faulty.clone());
    ctx.spawn("joiner", async move {
        let outcome = handle.await;
        *inner_result.borrow_mut() = Some((outcome, inner.time()));
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(
        *result.borrow(),
        Some((
            Err(SimError::ProcessFailed {
                process: faulty.id(),
                name: "faulty".to_owned(),
                message: "boom".to_owned(),
            }),
            2.
        ))
    );
    assert_eq!(sim.failures().len(), 1);
}

#[test]
fn test_join_finished_process() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let joined_at = Rc::new(Cell::new(-1.));

    let inner = ctx.clone();
    let worker = ctx.spawn("worker", async move {
        inner.timeout(3.)?.await?;
        Ok(())
    });
    let (inner, inner_joined_at) = (ctx.clone(), joined_at.clone());
    ctx.spawn("late joiner", async move {
        inner.timeout(10.)?.await?;
        worker.join().await?;
        inner_joined_at.set(inner.time());
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(joined_at.get(), 10.);
    assert!(sim.failures().is_empty());
}

#[test]
fn test_interrupt_waiting_process() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let result = Rc::new(RefCell::new(None));
    let resumed = Rc::new(Cell::new(false));

    let (inner, inner_resumed) = (ctx.clone(), resumed.clone());
    let victim = ctx.spawn("victim", async move {
        inner.timeout(100.)?.await?;
        inner_resumed.set(true);
        Ok(())
    });
    let (inner, handle) = (ctx.clone(), victim.clone());
    ctx.spawn("interrupter", async move {
        inner.timeout(10.)?.await?;
        handle.interrupt("closing time");
        Ok(())
    });
    let (inner, inner_result, handle) = (ctx.clone(), result.clone(), victim.clone());
    ctx.spawn("joiner", async move {
        let outcome = handle.join().await;
        *inner_result.borrow_mut() = Some((outcome, inner.time()));
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert!(!resumed.get());
    assert_eq!(victim.state(), ProcessState::Cancelled);
    assert_eq!(
        *result.borrow(),
        Some((
            Err(SimError::Interrupted {
                cause: "closing time".to_owned()
            }),
            10.
        ))
    );
    // The abandoned timeout is still processed
    assert_eq!(sim.time(), 100.);
    assert!(sim.failures().is_empty());
}

#[test]
fn test_handled_interrupt() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let finished_at = Rc::new(Cell::new(-1.));

    let (inner, inner_finished_at) = (ctx.clone(), finished_at.clone());
    let victim = ctx.spawn("victim", async move {
        match inner.timeout(100.)?.await {
            Err(SimError::Interrupted { cause }) => {
                assert_eq!(cause, "hurry up");
                inner.timeout(5.)?.await?;
            }
            other => other?,
        }
        inner_finished_at.set(inner.time());
        Ok(())
    });
    let (inner, handle) = (ctx.clone(), victim.clone());
    ctx.spawn("interrupter", async move {
        inner.timeout(10.)?.await?;
        handle.interrupt("hurry up");
        // A second interrupt before the first one is delivered is ignored
        handle.interrupt("again");
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(finished_at.get(), 15.);
    assert_eq!(victim.state(), ProcessState::Finished);
}

#[test]
fn test_interrupt_created_process() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let started = Rc::new(Cell::new(false));

    let inner_started = started.clone();
    let victim = ctx.spawn("victim", async move {
        inner_started.set(true);
        Ok(())
    });
    assert_eq!(victim.state(), ProcessState::Created);
    victim.interrupt("never mind");
    assert_eq!(victim.state(), ProcessState::Cancelled);

    sim.step_until_no_events().unwrap();
    assert!(!started.get());
    assert_eq!(victim.state(), ProcessState::Cancelled);
}

#[test]
fn test_interrupt_terminated_process() {
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");

    let victim = ctx.spawn("victim", async move { Ok(()) });
    sim.step_until_no_events().unwrap();
    assert_eq!(victim.state(), ProcessState::Finished);

    victim.interrupt("too late");
    sim.step_until_no_events().unwrap();
    assert_eq!(victim.state(), ProcessState::Finished);
    assert!(victim.is_terminated());
}
