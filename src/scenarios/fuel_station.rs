//! Fuel station with a limited number of pumps sharing one underground tank.
//!
//! Cars arrive at exponentially distributed intervals, take one of the pumps, draw the fuel they need from the tank
//! and occupy the pump while refuelling. A control process checks the tank level at a fixed interval and calls a tank
//! truck when the level drops below a threshold. The truck needs some time to arrive and to pump the fuel, and then
//! fills the tank up to its capacity.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::context::SimulationContext;
use crate::error::{ProcessResult, SimError};
use crate::monitor::{MonitoredResource, Sample};
use crate::random::Sampler;
use crate::scenarios::{check, check_non_negative, check_positive};
use crate::simulation::Simulation;
use crate::{log_debug, log_info};

/// Fuel station parameters. Times are in minutes, volumes in liters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelStationConfig {
    /// Number of fuel pumps.
    pub pumps: usize,
    /// Capacity of the station tank, which is initially full.
    pub tank_capacity: f64,
    /// Fraction of the capacity below which the tank truck is called.
    pub threshold: f64,
    /// Interval between tank level checks.
    pub check_interval: f64,
    /// Time for the tank truck to arrive.
    pub truck_travel_time: f64,
    /// Time for the tank truck to pump fuel into the tank.
    pub truck_refill_time: f64,
    /// Car fuel tank sizes, chosen uniformly.
    pub car_tank_sizes: Vec<f64>,
    /// Lower bound, mode and upper bound of the fraction of the car tank to fill.
    pub fill_fraction: (f64, f64, f64),
    /// Refuelling speed in liters per minute.
    pub refuelling_speed: f64,
    /// Mean interval between car arrivals.
    pub mean_arrival_interval: f64,
    /// Simulation horizon.
    pub sim_time: f64,
}

impl Default for FuelStationConfig {
    fn default() -> Self {
        Self {
            pumps: 2,
            tank_capacity: 5000.,
            threshold: 0.3,
            check_interval: 10.,
            truck_travel_time: 30.,
            truck_refill_time: 20.,
            car_tank_sizes: vec![45., 60., 150.],
            fill_fraction: (0.75, 0.9, 1.),
            refuelling_speed: 50.,
            mean_arrival_interval: 1.,
            sim_time: 1440.,
        }
    }
}

impl FuelStationConfig {
    /// Parses the configuration from JSON, missing fields take default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Checks that all values are within their valid ranges.
    pub fn validate(&self) -> Result<(), SimError> {
        check("pumps", self.pumps > 0, "must be positive")?;
        check_positive("tank_capacity", self.tank_capacity)?;
        check(
            "threshold",
            (0. ..=1.).contains(&self.threshold),
            "must be a fraction within [0, 1]",
        )?;
        check_positive("check_interval", self.check_interval)?;
        check_non_negative("truck_travel_time", self.truck_travel_time)?;
        check_non_negative("truck_refill_time", self.truck_refill_time)?;
        check("car_tank_sizes", !self.car_tank_sizes.is_empty(), "must not be empty")?;
        for &size in &self.car_tank_sizes {
            check_positive("car_tank_sizes", size)?;
        }
        let (low, mode, high) = self.fill_fraction;
        check_non_negative("fill_fraction", low)?;
        check(
            "fill_fraction",
            low <= mode && mode <= high && high.is_finite(),
            "must be ordered as (low, mode, high)",
        )?;
        check_positive("refuelling_speed", self.refuelling_speed)?;
        check_positive("mean_arrival_interval", self.mean_arrival_interval)?;
        check_non_negative("sim_time", self.sim_time)
    }
}

/// A served car.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    /// Car name.
    pub name: String,
    /// Arrival time.
    pub arrived_at: f64,
    /// Time spent waiting for a pump.
    pub pump_wait: f64,
    /// Liters of fuel taken.
    pub liters: f64,
    /// Departure time.
    pub left_at: f64,
}

/// A tank truck trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Refill {
    /// Time the truck was called.
    pub called_at: f64,
    /// Tank level when the truck was called.
    pub level_at_call: f64,
    /// Time the truck started pumping.
    pub arrived_at: f64,
    /// Liters pumped into the tank.
    pub amount: f64,
    /// Time the pumped fuel was added to the tank.
    pub completed_at: f64,
}

/// Results of a fuel station run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelStationReport {
    /// Pump queue length samples.
    pub samples: Vec<Sample>,
    /// Cars which completed refuelling.
    pub cars: Vec<CarRecord>,
    /// Tank truck trips.
    pub refills: Vec<Refill>,
    /// Tank level at the end of the run.
    pub final_level: f64,
}

impl FuelStationReport {
    /// Returns the total amount of fuel taken by the served cars.
    pub fn fuel_dispensed(&self) -> f64 {
        self.cars.iter().map(|c| c.liters).sum()
    }
}

/// Fuel station model: the pumps, the tank and the records of served cars and truck trips.
#[derive(Clone)]
pub struct FuelStation {
    config: Rc<FuelStationConfig>,
    pumps: MonitoredResource,
    tank: Container,
    cars: Rc<RefCell<Vec<CarRecord>>>,
    refills: Rc<RefCell<Vec<Refill>>>,
    ctx: SimulationContext,
}

impl FuelStation {
    /// Creates a station with a full tank.
    ///
    /// Fails with [`SimError::InvalidConfig`] if the configuration does not pass [`FuelStationConfig::validate`].
    pub fn new(config: FuelStationConfig, ctx: SimulationContext) -> Result<Self, SimError> {
        config.validate()?;
        let pumps = MonitoredResource::new(&ctx, config.pumps);
        let tank = Container::with_level(&ctx, config.tank_capacity, config.tank_capacity)?;
        Ok(Self {
            config: Rc::new(config),
            pumps,
            tank,
            cars: Rc::new(RefCell::new(Vec::new())),
            refills: Rc::new(RefCell::new(Vec::new())),
            ctx,
        })
    }

    /// Returns the pumps.
    pub fn pumps(&self) -> &MonitoredResource {
        &self.pumps
    }

    /// Returns the station tank.
    pub fn tank(&self) -> &Container {
        &self.tank
    }

    /// Spawns the process checking the tank level and calling the tank truck.
    pub fn start_control(&self) {
        let station = self.clone();
        self.ctx.spawn("tank control", async move { station.control_tank().await });
    }

    /// Spawns the process generating cars.
    pub fn start_arrivals<S: Sampler + 'static>(&self, sampler: Rc<S>) {
        let station = self.clone();
        self.ctx
            .spawn("car generator", async move { station.generate_cars(sampler).await });
    }

    /// Spawns the tank truck process, which fills the tank up after the travel and refill delays.
    pub fn call_tank_truck(&self) -> crate::ProcessHandle {
        let station = self.clone();
        self.ctx.spawn("tank truck", async move { station.tank_truck().await })
    }

    /// Builds the report of the run so far.
    pub fn report(&self) -> FuelStationReport {
        FuelStationReport {
            samples: self.pumps.samples(),
            cars: self.cars.borrow().clone(),
            refills: self.refills.borrow().clone(),
            final_level: self.tank.level(),
        }
    }

    async fn control_tank(self) -> ProcessResult {
        loop {
            let level = self.tank.level();
            if level / self.tank.capacity() < self.config.threshold {
                log_info!(self.ctx, "calling tank truck, level {:.1}", level);
                // Waiting for the truck keeps at most one trip in flight.
                self.call_tank_truck().await?;
            }
            self.ctx.timeout(self.config.check_interval)?.await?;
        }
    }

    async fn tank_truck(self) -> ProcessResult {
        let called_at = self.ctx.time();
        let level_at_call = self.tank.level();
        self.ctx.timeout(self.config.truck_travel_time)?.await?;
        let arrived_at = self.ctx.time();
        log_info!(self.ctx, "tank truck arrived, level {:.1}", self.tank.level());
        self.ctx.timeout(self.config.truck_refill_time)?.await?;
        // Cars keep drawing fuel while the truck pumps, so the deficit is measured when the fuel is added.
        let amount = self.tank.capacity() - self.tank.level();
        self.tank.put(amount)?.await?;
        log_info!(self.ctx, "tank truck refuelled {:.1} liters", amount);
        self.refills.borrow_mut().push(Refill {
            called_at,
            level_at_call,
            arrived_at,
            amount,
            completed_at: self.ctx.time(),
        });
        Ok(())
    }

    async fn generate_cars<S: Sampler + 'static>(self, sampler: Rc<S>) -> ProcessResult {
        for i in 0.. {
            self.ctx
                .timeout(sampler.exponential(self.config.mean_arrival_interval))?
                .await?;
            let station = self.clone();
            let sampler = sampler.clone();
            let name = format!("car {}", i);
            self.ctx
                .spawn(&name.clone(), async move { station.refuel(name, sampler).await });
        }
        Ok(())
    }

    async fn refuel<S: Sampler>(self, name: String, sampler: Rc<S>) -> ProcessResult {
        let (low, mode, high) = self.config.fill_fraction;
        let fill = sampler.triangular(low, mode, high);
        let arrived_at = self.ctx.time();
        log_debug!(self.ctx, "{} arrived", name);

        let pump = self.pumps.request().await?;
        let pump_wait = self.ctx.time() - arrived_at;
        let tank_size = sampler
            .choose(&self.config.car_tank_sizes)
            .copied()
            .unwrap_or_default();
        let liters = self.tank.get(tank_size * fill)?.await?;
        self.ctx.timeout(liters / self.config.refuelling_speed)?.await?;
        drop(pump);

        log_debug!(
            self.ctx,
            "{} refuelled {:.1} liters in {:.1} minutes",
            name,
            liters,
            self.ctx.time() - arrived_at
        );
        self.cars.borrow_mut().push(CarRecord {
            name,
            arrived_at,
            pump_wait,
            liters,
            left_at: self.ctx.time(),
        });
        Ok(())
    }
}

/// Runs the fuel station scenario up to the configured horizon.
pub fn run_fuel_station<S: Sampler + 'static>(
    config: FuelStationConfig,
    sampler: Rc<S>,
) -> Result<FuelStationReport, SimError> {
    let mut sim = Simulation::new();
    let sim_time = config.sim_time;
    let station = FuelStation::new(config, sim.create_context("fuel_station"))?;
    station.start_control();
    station.start_arrivals(sampler);
    sim.run(Some(sim_time))?;
    Ok(station.report())
}
