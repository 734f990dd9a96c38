use std::cell::{Cell, RefCell};
use std::rc::Rc;

use procsim::{ProcessState, Resource, Sampler, SeededSampler, SimError, Simulation};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_capacity_is_never_exceeded() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let resource = Resource::new(&ctx, 3);
    let sampler = Rc::new(SeededSampler::new(7));
    let max_count = Rc::new(Cell::new(0));
    let served = Rc::new(Cell::new(0));

    for i in 0..30 {
        let (inner, resource, sampler) = (ctx.clone(), resource.clone(), sampler.clone());
        let (max_count, served) = (max_count.clone(), served.clone());
        ctx.spawn(&format!("user {}", i), async move {
            inner.timeout(sampler.exponential(1.))?.await?;
            let grant = resource.request().await?;
            assert!(grant.is_held());
            assert!(resource.count() <= resource.capacity());
            max_count.set(max_count.get().max(resource.count()));
            inner.timeout(sampler.exponential(5.))?.await?;
            served.set(served.get() + 1);
            Ok(())
        });
    }

    sim.step_until_no_events().unwrap();
    assert_eq!(served.get(), 30);
    assert_eq!(max_count.get(), 3);
    assert_eq!(resource.count(), 0);
    assert_eq!(resource.queue_len(), 0);
}

#[test]
fn test_requests_are_granted_in_order() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let resource = Resource::new(&ctx, 1);
    let grants = Rc::new(RefCell::new(Vec::new()));

    for (i, name) in ["A", "B", "C"].into_iter().enumerate() {
        let (inner, resource, grants) = (ctx.clone(), resource.clone(), grants.clone());
        ctx.spawn(name, async move {
            inner.timeout(i as f64)?.await?;
            let _grant = resource.request().await?;
            grants.borrow_mut().push((name, inner.time()));
            inner.timeout(10.)?.await?;
            Ok(())
        });
    }

    sim.step_until_no_events().unwrap();
    assert_eq!(*grants.borrow(), vec![("A", 0.), ("B", 10.), ("C", 20.)]);
    assert_eq!(sim.time(), 30.);
}

#[test]
fn test_double_release() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let resource = Resource::new(&ctx, 2);
    let results = Rc::new(RefCell::new(Vec::new()));

    let (inner_resource, inner_results) = (resource.clone(), results.clone());
    ctx.spawn("sloppy", async move {
        let _other = inner_resource.request().await?;
        let grant = inner_resource.request().await?;
        inner_results.borrow_mut().push(inner_resource.release(&grant));
        assert!(!grant.is_held());
        inner_results.borrow_mut().push(inner_resource.release(&grant));
        assert_eq!(inner_resource.count(), 1);
        Ok(())
    });

    let error = sim.step_until_no_events().unwrap_err();
    assert_eq!(error, SimError::DoubleRelease { grant: 1 });
    assert_eq!(
        *results.borrow(),
        vec![Ok(()), Err(SimError::DoubleRelease { grant: 1 })]
    );
    // The run can be resumed after the defect is reported
    sim.step_until_no_events().unwrap();
    assert_eq!(resource.count(), 0);
}

#[test]
fn test_grant_released_when_process_fails() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let resource = Resource::new(&ctx, 1);
    let granted_at = Rc::new(Cell::new(-1.));

    let (inner, inner_resource) = (ctx.clone(), resource.clone());
    let faulty = ctx.spawn("faulty", async move {
        let _grant = inner_resource.request().await?;
        inner.timeout(4.)?.await?;
        inner.timeout(-1.)?.await?;
        Ok(())
    });
    let (inner, inner_resource, inner_granted_at) = (ctx.clone(), resource.clone(), granted_at.clone());
    ctx.spawn("patient", async move {
        inner.timeout(1.)?.await?;
        let _grant = inner_resource.request().await?;
        inner_granted_at.set(inner.time());
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(faulty.state(), ProcessState::Failed);
    assert_eq!(granted_at.get(), 4.);
    assert_eq!(resource.count(), 0);
}

#[test]
fn test_interrupted_request_is_withdrawn() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let resource = Resource::new(&ctx, 1);
    let granted_at = Rc::new(Cell::new(-1.));

    let (inner, inner_resource) = (ctx.clone(), resource.clone());
    ctx.spawn("holder", async move {
        let _grant = inner_resource.request().await?;
        inner.timeout(10.)?.await?;
        Ok(())
    });
    let (inner, inner_resource) = (ctx.clone(), resource.clone());
    let impatient = ctx.spawn("impatient", async move {
        inner.timeout(1.)?.await?;
        let _grant = inner_resource.request().await?;
        unreachable!("the request is interrupted before it is granted");
    });
    let (inner, inner_resource, handle) = (ctx.clone(), resource.clone(), impatient.clone());
    ctx.spawn("interrupter", async move {
        inner.timeout(3.)?.await?;
        assert_eq!(inner_resource.queue_len(), 1);
        handle.interrupt("gave up");
        Ok(())
    });
    let (inner, inner_resource, inner_granted_at) = (ctx.clone(), resource.clone(), granted_at.clone());
    ctx.spawn("latecomer", async move {
        inner.timeout(4.)?.await?;
        assert_eq!(inner_resource.queue_len(), 0);
        let _grant = inner_resource.request().await?;
        inner_granted_at.set(inner.time());
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(impatient.state(), ProcessState::Cancelled);
    assert_eq!(granted_at.get(), 10.);
    assert!(sim.failures().is_empty());
}
