//! M/M/1 queue: Poisson arrivals served one at a time with exponentially distributed service times.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::context::SimulationContext;
use crate::error::{ProcessResult, SimError};
use crate::log_trace;
use crate::monitor::{MonitoredResource, Sample};
use crate::random::Sampler;
use crate::scenarios::{check_non_negative, check_positive};
use crate::simulation::Simulation;

/// M/M/1 parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mm1Config {
    /// Mean interval between arrivals (1 / lambda).
    pub arrival_interval: f64,
    /// Mean service time (1 / mu).
    pub service_time: f64,
    /// Simulation horizon.
    pub sim_time: f64,
}

impl Default for Mm1Config {
    fn default() -> Self {
        Self {
            arrival_interval: 10.,
            service_time: 8.,
            sim_time: 10000.,
        }
    }
}

impl Mm1Config {
    /// Parses the configuration from JSON, missing fields take default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Checks that all values are within their valid ranges.
    pub fn validate(&self) -> Result<(), SimError> {
        check_positive("arrival_interval", self.arrival_interval)?;
        check_positive("service_time", self.service_time)?;
        check_non_negative("sim_time", self.sim_time)
    }

    /// Returns the closed-form steady state values for this configuration.
    pub fn theory(&self) -> Mm1Theory {
        Mm1Theory::new(1. / self.arrival_interval, 1. / self.service_time)
    }
}

/// Steady state characteristics of an M/M/1 queue.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mm1Theory {
    /// Mean time in system, 1 / (mu - lambda).
    pub time_in_system: f64,
    /// Mean time in queue, rho / (mu - lambda).
    pub queue_delay: f64,
    /// Mean number of customers in system, rho / (1 - rho).
    pub customers_in_system: f64,
    /// Mean number of customers in queue, rho^2 / (1 - rho).
    pub customers_in_queue: f64,
    /// Server utilization, rho = lambda / mu.
    pub utilization: f64,
}

impl Mm1Theory {
    /// Computes the values for arrival rate `lambda` and service rate `mu`, which must satisfy `lambda < mu`.
    pub fn new(lambda: f64, mu: f64) -> Self {
        let rho = lambda / mu;
        Self {
            time_in_system: 1. / (mu - lambda),
            queue_delay: rho / (mu - lambda),
            customers_in_system: rho / (1. - rho),
            customers_in_queue: rho * rho / (1. - rho),
            utilization: rho,
        }
    }
}

/// Statistics collected from an M/M/1 run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mm1Stats {
    /// Customers which started service.
    pub served: usize,
    /// Customers which left the system.
    pub completed: usize,
    /// Mean time from arrival to start of service.
    pub mean_queue_delay: f64,
    /// Mean time from arrival to departure, over departed customers.
    pub mean_time_in_system: f64,
    /// Total time spent in system by departed customers divided by the horizon.
    pub mean_customers_in_system: f64,
    /// Total sampled service time divided by the horizon.
    pub utilization: f64,
}

/// Results of an M/M/1 run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mm1Report {
    /// Server queue length samples.
    pub samples: Vec<Sample>,
    /// Collected statistics.
    pub stats: Mm1Stats,
    /// Closed-form values for comparison.
    pub theory: Mm1Theory,
}

#[derive(Default)]
struct Observations {
    queue_delays: Vec<f64>,
    times_in_system: Vec<f64>,
    total_service_time: f64,
}

/// M/M/1 model: a single server and the observations of its customers.
#[derive(Clone)]
pub struct Mm1Queue {
    config: Rc<Mm1Config>,
    server: MonitoredResource,
    observations: Rc<RefCell<Observations>>,
    ctx: SimulationContext,
}

impl Mm1Queue {
    /// Creates an idle queue.
    ///
    /// Fails with [`SimError::InvalidConfig`] if the configuration does not pass [`Mm1Config::validate`].
    pub fn new(config: Mm1Config, ctx: SimulationContext) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config: Rc::new(config),
            server: MonitoredResource::new(&ctx, 1),
            observations: Rc::new(RefCell::new(Observations::default())),
            ctx,
        })
    }

    /// Returns the server.
    pub fn server(&self) -> &MonitoredResource {
        &self.server
    }

    /// Spawns the arrival process.
    pub fn start<S: Sampler + 'static>(&self, sampler: Rc<S>) {
        let queue = self.clone();
        self.ctx
            .spawn("arrivals", async move { queue.arrivals(sampler).await });
    }

    /// Computes statistics over the observations so far, normalizing totals by `horizon`.
    pub fn stats(&self, horizon: f64) -> Mm1Stats {
        let obs = self.observations.borrow();
        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        Mm1Stats {
            served: obs.queue_delays.len(),
            completed: obs.times_in_system.len(),
            mean_queue_delay: mean(&obs.queue_delays),
            mean_time_in_system: mean(&obs.times_in_system),
            mean_customers_in_system: obs.times_in_system.iter().sum::<f64>() / horizon,
            utilization: obs.total_service_time / horizon,
        }
    }

    async fn arrivals<S: Sampler + 'static>(self, sampler: Rc<S>) -> ProcessResult {
        for i in 0.. {
            let queue = self.clone();
            let customer_sampler = sampler.clone();
            let name = format!("customer {:02}", i);
            self.ctx
                .spawn(&name.clone(), async move { queue.serve(name, customer_sampler).await });
            self.ctx
                .timeout(sampler.exponential(self.config.arrival_interval))?
                .await?;
        }
        Ok(())
    }

    async fn serve<S: Sampler>(self, name: String, sampler: Rc<S>) -> ProcessResult {
        let arrived_at = self.ctx.time();
        log_trace!(self.ctx, "{} arrives", name);

        let _server = self.server.request().await?;
        let delay = self.ctx.time() - arrived_at;
        self.observations.borrow_mut().queue_delays.push(delay);
        log_trace!(self.ctx, "{} starts service after {:.2}", name, delay);

        let service_time = sampler.exponential(self.config.service_time);
        self.observations.borrow_mut().total_service_time += service_time;
        self.ctx.timeout(service_time)?.await?;

        self.observations
            .borrow_mut()
            .times_in_system
            .push(self.ctx.time() - arrived_at);
        log_trace!(self.ctx, "{} leaves", name);
        Ok(())
    }
}

/// Runs the M/M/1 scenario up to the configured horizon.
pub fn run_mm1<S: Sampler + 'static>(config: Mm1Config, sampler: Rc<S>) -> Result<Mm1Report, SimError> {
    let mut sim = Simulation::new();
    let sim_time = config.sim_time;
    let theory = config.theory();
    let queue = Mm1Queue::new(config, sim.create_context("mm1"))?;
    queue.start(sampler);
    sim.run(Some(sim_time))?;
    Ok(Mm1Report {
        samples: queue.server().samples(),
        stats: queue.stats(sim_time),
        theory,
    })
}
