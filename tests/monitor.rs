use procsim::{MonitoredResource, Sample, Simulation};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn samples(values: &[(f64, usize)]) -> Vec<Sample> {
    values
        .iter()
        .map(|&(time, queue_len)| Sample { time, queue_len })
        .collect()
}

#[test]
fn test_samples_are_recorded_before_each_operation() {
    init_logger();
    let mut sim = Simulation::new();
    let ctx = sim.create_context("test");
    let server = MonitoredResource::new(&ctx, 1);

    // A releases explicitly, B and C release by dropping their grants
    let (inner, inner_server) = (ctx.clone(), server.clone());
    ctx.spawn("A", async move {
        let grant = inner_server.request().await?;
        inner.timeout(10.)?.await?;
        inner_server.release(&grant)?;
        Ok(())
    });
    let (inner, inner_server) = (ctx.clone(), server.clone());
    ctx.spawn("B", async move {
        inner.timeout(1.)?.await?;
        let _grant = inner_server.request().await?;
        inner.timeout(5.)?.await?;
        Ok(())
    });
    let (inner, inner_server) = (ctx.clone(), server.clone());
    ctx.spawn("C", async move {
        inner.timeout(2.)?.await?;
        let _grant = inner_server.request().await?;
        inner.timeout(2.)?.await?;
        Ok(())
    });

    sim.step_until_no_events().unwrap();
    assert_eq!(
        server.samples(),
        samples(&[(0., 0), (1., 0), (2., 1), (10., 2), (15., 1), (17., 0)])
    );
    assert_eq!(sim.time(), 17.);
    assert_eq!(server.count(), 0);
}

#[test]
fn test_samples_serialize_to_json() {
    let sample = Sample { time: 2.5, queue_len: 3 };
    let json = serde_json::to_string(&sample).unwrap();
    assert_eq!(json, r#"{"time":2.5,"queue_len":3}"#);
    assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
}
