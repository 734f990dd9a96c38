//! Accessing simulation from processes and models.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::error::{ProcessResult, SimError};
use crate::event::Event;
use crate::executor::Executor;
use crate::log_warn;
use crate::process::{ProcessHandle, ProcessId, ProcessState};
use crate::state::SimulationState;

/// A named handle used by processes and models to access the simulation: read the clock, spawn processes and create
/// events.
///
/// Contexts are created with [`Simulation::create_context`](crate::Simulation::create_context) and are cheap to clone.
/// The context name is used as the target of log messages emitted with the crate logging macros.
#[derive(Clone)]
pub struct SimulationContext {
    name: Rc<str>,
    sim_state: Rc<RefCell<SimulationState>>,
    executor: Rc<RefCell<Executor>>,
}

impl SimulationContext {
    pub(crate) fn new(name: &str, sim_state: Rc<RefCell<SimulationState>>, executor: Rc<RefCell<Executor>>) -> Self {
        Self {
            name: Rc::from(name),
            sim_state,
            executor,
        }
    }

    /// Returns the context name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a context sharing the same simulation under a different name.
    pub fn with_name(&self, name: &str) -> Self {
        Self::new(name, self.sim_state.clone(), self.executor.clone())
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns the id of the process being executed, if any.
    pub fn active_process(&self) -> Option<ProcessId> {
        self.sim_state.borrow().active_process()
    }

    /// Returns the state of the process, or `None` if no such process was spawned.
    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.sim_state.borrow().process_state(id)
    }

    /// Spawns a new process.
    ///
    /// The process does not run inline: its first step is executed when the simulation processes its start event,
    /// which is scheduled at the current time after all previously scheduled events due at this time.
    ///
    /// The process terminates when `future` completes. An error returned from the future does not stop the simulation:
    /// the process is marked as failed (or cancelled, for an unhandled interruption) and the error is delivered to
    /// processes awaiting its [`ProcessHandle`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use procsim::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let ctx = sim.create_context("worker");
    /// let inner = ctx.clone();
    /// ctx.spawn("sleeper", async move {
    ///     inner.timeout(5.)?.await?;
    ///     Ok(())
    /// });
    /// sim.step_until_no_events().unwrap();
    /// assert_eq!(sim.time(), 5.);
    /// ```
    pub fn spawn<F>(&self, name: &str, future: F) -> ProcessHandle
    where
        F: Future<Output = ProcessResult> + 'static,
    {
        let (id, start) = self.sim_state.borrow_mut().register_process(name);
        let waker = self.executor.borrow_mut().spawn(id, Box::pin(future));
        let completion = {
            let mut state = self.sim_state.borrow_mut();
            let token = state.next_token();
            start.borrow_mut().add_waiter(token, Some(id), &waker);
            state.trigger_now(&start, Ok(()));
            state.completion(id)
        };
        let completion = match completion {
            Some(slot) => Event::new(slot, self.sim_state.clone()),
            None => self.event(),
        };
        log::trace!(target: self.name(), "[{:.3}] spawned process {} ({})", self.time(), name, id);
        ProcessHandle::new(id, name, completion, self.clone())
    }

    /// Creates a new pending event. It is triggered by calling [`Event::succeed`] or [`Event::fail`].
    pub fn event(&self) -> Event {
        let slot = self.sim_state.borrow_mut().new_slot();
        Event::new(slot, self.sim_state.clone())
    }

    /// Creates an event which is processed after `duration` from now.
    ///
    /// Fails with [`SimError::InvalidDuration`] if `duration` is negative or NaN. There is no upper bound, but events
    /// scheduled after the simulation horizon are never processed.
    pub fn timeout(&self, duration: f64) -> Result<Event, SimError> {
        if duration.is_nan() || duration < 0. {
            return Err(SimError::InvalidDuration { duration });
        }
        let event = self.event();
        event.trigger(Ok(()), duration);
        Ok(event)
    }

    /// Creates an event which is processed at the absolute simulation time `time`.
    ///
    /// Scheduling before the current time is a model defect: it fails with [`SimError::PastEvent`] and aborts the
    /// running simulation step.
    pub fn timeout_at(&self, time: f64) -> Result<Event, SimError> {
        let now = {
            let mut state = self.sim_state.borrow_mut();
            state.check_time(time)?;
            state.time()
        };
        let event = self.event();
        event.trigger(Ok(()), time - now);
        Ok(event)
    }

    /// Records a model defect which aborts the running simulation step.
    pub(crate) fn report_fatal(&self, error: SimError) {
        self.sim_state.borrow_mut().report_fatal(error);
    }

    pub(crate) fn interrupt(&self, id: ProcessId, cause: &str) {
        let mut state = self.sim_state.borrow_mut();
        match state.process_state(id) {
            None
            | Some(ProcessState::Finished)
            | Some(ProcessState::Failed)
            | Some(ProcessState::Cancelled) => {}
            Some(ProcessState::Running) => {
                drop(state);
                log_warn!(self, "process {} cannot interrupt itself, ignoring", id);
            }
            Some(ProcessState::Created) => {
                state.detach(id);
                state.complete_process(
                    id,
                    ProcessState::Cancelled,
                    Err(SimError::Interrupted { cause: cause.to_owned() }),
                );
                drop(state);
                let task = self.executor.borrow_mut().take(id);
                drop(task);
                log::debug!(target: self.name(), "[{:.3}] process {} cancelled before start", self.time(), id);
            }
            Some(ProcessState::Waiting) => {
                if !state.request_interrupt(id, cause) {
                    return;
                }
                state.detach(id);
                let waker = self.executor.borrow().waker(id);
                let slot = state.new_slot();
                let token = state.next_token();
                slot.borrow_mut().add_waiter(token, Some(id), &waker);
                state.trigger_now(&slot, Ok(()));
                drop(state);
                log::debug!(target: self.name(), "[{:.3}] process {} interrupted: {}", self.time(), id, cause);
            }
        }
    }
}
