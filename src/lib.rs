//! Procsim is a process-based discrete event simulation kernel. Simulation models are written as ordinary async
//! functions, _processes_, which advance through simulated time by awaiting timeouts, shared resources and containers.
//! The kernel drives all processes on a single logical thread, so runs are fully deterministic.
//!
//! ## Contents
//!
//! - [Basic Concepts](crate#basic-concepts)
//! - [Example](crate#example)
//! - [Programming Interfaces](crate#programming-interfaces)
//! - [Errors](crate#errors)
//!
//! ## Basic Concepts
//!
//! **Simulation.** The simulation owns a virtual clock and a queue of pending events ordered by their time and, for
//! equal times, by the order in which they were scheduled. Following the
//! [discrete-event simulation](https://en.wikipedia.org/wiki/Discrete-event_simulation) approach, the simulation
//! repeatedly takes the earliest event, advances the clock to the event time and resumes the processes waiting for
//! this event. The clock never goes backwards and there is no relation to wall-clock time.
//!
//! **Event.** An event is a one-shot point in simulated time. It starts pending, is triggered with an outcome (success
//! or failure) and is processed when the clock reaches its time. Timeouts, resource grants, container operations and
//! process termination are all events.
//!
//! **Process.** A process is an independently scheduled unit of model logic expressed as a future. Each `await` on an
//! event is a suspension point: the process stays suspended until the event is processed and is then resumed with the
//! event outcome. Exactly one process runs at a time and it runs until its next suspension point. A process may fail
//! without stopping the simulation and may be interrupted by other processes.
//!
//! **Resource.** A [`Resource`] is a pool of identical slots with a fair FIFO wait queue. A [`MonitoredResource`] also
//! records the queue length on every request and release.
//!
//! **Container.** A [`Container`] holds a continuous amount between zero and its capacity. Gets wait for enough level
//! and puts wait for enough room.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use procsim::{Container, Resource, Simulation};
//!
//! let mut sim = Simulation::new();
//! let ctx = sim.create_context("station");
//! let pumps = Resource::new(&ctx, 1);
//! let tank = Container::with_level(&ctx, 100., 100.).unwrap();
//!
//! for car in 0..3 {
//!     let (ctx, pumps, tank) = (ctx.clone(), pumps.clone(), tank.clone());
//!     ctx.clone().spawn(&format!("car {}", car), async move {
//!         // Occupy a pump, take 40 liters and refuel at 10 liters per minute
//!         let _pump = pumps.request().await?;
//!         let liters = tank.get(40.)?.await?;
//!         ctx.timeout(liters / 10.)?.await?;
//!         Ok(())
//!     });
//! }
//!
//! sim.step_until_no_events().unwrap();
//! // Two cars were served one after another, the third one waits for fuel forever
//! assert_eq!(sim.time(), 8.);
//! assert_eq!(tank.level(), 20.);
//! assert_eq!(tank.get_queue_len(), 1);
//! ```
//!
//! ## Programming Interfaces
//!
//! [`Simulation`] is the main interface for running a model. It creates named [`SimulationContext`]s and runs the
//! simulation either step by step ([`step`](Simulation::step), [`steps`](Simulation::steps)) or up to some point
//! ([`step_until_no_events`](Simulation::step_until_no_events), [`step_until_time`](Simulation::step_until_time),
//! [`run`](Simulation::run)).
//!
//! [`SimulationContext`] is the interface used by models and processes. It reads the clock, spawns processes with
//! [`spawn`](SimulationContext::spawn), creates timeouts and generic events. The context name is used as the target
//! of log messages emitted with [`log_info!`] and the other logging macros.
//!
//! Spawning returns a [`ProcessHandle`] which can be awaited to wait for the process termination or used to
//! [`interrupt`](ProcessHandle::interrupt) the process.
//!
//! Random draws are not part of the kernel: models receive a [`Sampler`] explicitly, such as [`SeededSampler`], so
//! that every run owns its random state.
//!
//! ## Errors
//!
//! Kernel operations return [`SimError`]. Invalid arguments (negative timeouts, invalid container amounts) are returned
//! to the caller, and a process propagating such an error with `?` fails alone. Model defects (scheduling in the
//! past, releasing a grant twice) additionally abort the current simulation step, which returns the error.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod container;
pub mod context;
pub mod error;
pub mod event;
mod executor;
pub mod log;
pub mod monitor;
pub mod process;
pub mod random;
pub mod resource;
pub mod scenarios;
pub mod simulation;
mod state;

pub use colored;
pub use container::{Container, ContainerGet, ContainerPut};
pub use context::SimulationContext;
pub use error::{ProcessResult, SimError};
pub use event::{Event, EventId, EventOutcome, Wait};
pub use monitor::{MonitoredGrant, MonitoredRequest, MonitoredResource, Sample};
pub use process::{ProcessFailure, ProcessHandle, ProcessId, ProcessState};
pub use random::{Sampler, SeededSampler};
pub use resource::{Grant, Request, Resource};
pub use simulation::Simulation;
pub use state::EPSILON;

#[doc(hidden)]
pub use ::log as log_facade;
