//! Simulation configuration and execution.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::context::SimulationContext;
use crate::error::{ProcessResult, SimError};
use crate::executor::Executor;
use crate::log_error;
use crate::process::{ProcessFailure, ProcessHandle, ProcessId, ProcessState};
use crate::state::SimulationState;

/// Represents a simulation, provides methods for its configuration and execution.
///
/// The simulation owns the clock and the event queue. Events are processed in the order of their time, events due at
/// the same time are processed in the order they were scheduled. Processing an event resumes the processes awaiting
/// it; exactly one process runs at a time and it runs until its next suspension point.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    executor: Rc<RefCell<Executor>>,
    ctx: SimulationContext,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Creates a new simulation with the clock at zero.
    pub fn new() -> Self {
        let sim_state = Rc::new(RefCell::new(SimulationState::new()));
        let executor = Rc::new(RefCell::new(Executor::new()));
        let ctx = SimulationContext::new("simulation", sim_state.clone(), executor.clone());
        Self {
            sim_state,
            executor,
            ctx,
        }
    }

    /// Creates a new simulation context with the specified name.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        self.ctx.with_name(name.as_ref())
    }

    /// Spawns a process using the simulation's own context. See [`SimulationContext::spawn`].
    pub fn spawn<F>(&self, name: &str, future: F) -> ProcessHandle
    where
        F: Future<Output = ProcessResult> + 'static,
    {
        self.ctx.spawn(name, future)
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns the total number of processed events.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Returns the state of the process, or `None` if no such process was spawned.
    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.sim_state.borrow().process_state(id)
    }

    /// Returns the processes terminated by unhandled errors so far.
    pub fn failures(&self) -> Vec<ProcessFailure> {
        self.sim_state.borrow().failures().to_vec()
    }

    /// Performs a single step through the simulation.
    ///
    /// Takes the next event from the queue, advances the simulation time to the event time and resumes the processes
    /// awaiting it. Returns `Ok(false)` if there were no pending events, and an error if a model defect was detected
    /// during the step.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let next = self.sim_state.borrow_mut().next_event();
        let wakers = match next {
            Some(wakers) => wakers,
            None => return self.check_fatal().map(|_| false),
        };
        for waker in wakers {
            waker.wake();
        }
        self.run_ready_processes();
        self.check_fatal().map(|_| true)
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn steps(&mut self, step_count: u64) -> Result<bool, SimError> {
        for _ in 0..step_count {
            if !self.step()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Steps through the simulation until there are no pending events left.
    pub fn step_until_no_events(&mut self) -> Result<(), SimError> {
        while self.step()? {}
        Ok(())
    }

    /// Steps through the simulation until the specified time.
    ///
    /// Events due before `time` are processed, events due at or after `time` stay in the queue. The simulation time
    /// is set to `time` on return. Returns `Ok(true)` if there are pending events left.
    pub fn step_until_time(&mut self, time: f64) -> Result<bool, SimError> {
        let now = self.time();
        if time.is_nan() || time < now {
            return Err(SimError::PastEvent { time, now });
        }
        loop {
            let next_time = self.sim_state.borrow().peek_time();
            match next_time {
                Some(t) if t < time => {
                    self.step()?;
                }
                _ => break,
            }
        }
        self.sim_state.borrow_mut().set_time(time);
        Ok(self.sim_state.borrow().has_events())
    }

    /// Steps through the simulation for the specified duration from the current time.
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, SimError> {
        if duration.is_nan() || duration < 0. {
            return Err(SimError::InvalidDuration { duration });
        }
        let end_time = self.time() + duration;
        self.step_until_time(end_time)
    }

    /// Runs the simulation until the event queue is empty or, if `until` is specified, until that time.
    pub fn run(&mut self, until: Option<f64>) -> Result<(), SimError> {
        match until {
            Some(time) => self.step_until_time(time).map(|_| ()),
            None => self.step_until_no_events(),
        }
    }

    fn check_fatal(&self) -> Result<(), SimError> {
        match self.sim_state.borrow_mut().take_fatal() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn run_ready_processes(&self) {
        loop {
            let next = self.executor.borrow().next_ready();
            let Some(id) = next else {
                break;
            };
            let task = self.executor.borrow_mut().take(id);
            let Some(mut task) = task else {
                continue;
            };
            self.sim_state.borrow_mut().on_resume(id);
            let poll = {
                let mut cx = Context::from_waker(&task.waker);
                task.future.as_mut().poll(&mut cx)
            };
            match poll {
                Poll::Pending => {
                    self.sim_state.borrow_mut().on_suspend(id);
                    self.executor.borrow_mut().restore(id, task);
                }
                Poll::Ready(result) => {
                    drop(task);
                    self.complete_process(id, result);
                }
            }
        }
    }

    fn complete_process(&self, id: ProcessId, result: ProcessResult) {
        let name = self.sim_state.borrow().process_name(id);
        match result {
            Ok(()) => {
                self.sim_state
                    .borrow_mut()
                    .complete_process(id, ProcessState::Finished, Ok(()));
                log::trace!(target: self.ctx.name(), "[{:.3}] process {} ({}) finished", self.time(), name, id);
            }
            Err(error) => match error.downcast_ref::<SimError>() {
                Some(SimError::Interrupted { cause }) => {
                    let outcome = Err(SimError::Interrupted { cause: cause.clone() });
                    self.sim_state
                        .borrow_mut()
                        .complete_process(id, ProcessState::Cancelled, outcome);
                    log::debug!(target: self.ctx.name(), "[{:.3}] process {} ({}) cancelled", self.time(), name, id);
                }
                _ => {
                    let failure = ProcessFailure {
                        process: id,
                        name: name.clone(),
                        time: self.time(),
                        message: error.to_string(),
                    };
                    log_error!(self.ctx, "process {} ({}) failed: {}", name, id, failure.message);
                    let outcome = Err(SimError::ProcessFailed {
                        process: id,
                        name,
                        message: failure.message.clone(),
                    });
                    let mut state = self.sim_state.borrow_mut();
                    state.add_failure(failure);
                    state.complete_process(id, ProcessState::Failed, outcome);
                }
            },
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        // Suspended processes hold contexts referring back to the executor.
        let tasks = self.executor.borrow_mut().drain();
        drop(tasks);
    }
}
