//! Simulation processes.

use std::future::IntoFuture;

use serde::{Deserialize, Serialize};

use crate::context::SimulationContext;
use crate::event::{Event, Wait};

/// Process identifier.
pub type ProcessId = u64;

/// Lifecycle state of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    /// Spawned, its first step has not run yet.
    Created,
    /// Currently executing a step.
    Running,
    /// Suspended until the awaited event is processed.
    Waiting,
    /// Completed normally.
    Finished,
    /// Terminated with an unhandled error.
    Failed,
    /// Interrupted and terminated without handling the interruption.
    Cancelled,
}

impl ProcessState {
    /// Returns `true` if the process has terminated.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Finished | ProcessState::Failed | ProcessState::Cancelled)
    }
}

/// Record of a process terminated by an unhandled error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessFailure {
    /// Process id.
    pub process: ProcessId,
    /// Process name.
    pub name: String,
    /// Simulation time of the failure.
    pub time: f64,
    /// Rendered error.
    pub message: String,
}

/// Handle to a spawned process.
///
/// Awaiting the handle (or [`ProcessHandle::join`]) waits for the process to terminate: it completes with `Ok(())` if
/// the process finished normally, [`SimError::ProcessFailed`](crate::SimError::ProcessFailed) if it failed, and
/// [`SimError::Interrupted`](crate::SimError::Interrupted) if it was cancelled.
#[derive(Clone)]
pub struct ProcessHandle {
    id: ProcessId,
    name: String,
    completion: Event,
    ctx: SimulationContext,
}

impl ProcessHandle {
    pub(crate) fn new(id: ProcessId, name: &str, completion: Event, ctx: SimulationContext) -> Self {
        Self {
            id,
            name: name.to_owned(),
            completion,
            ctx,
        }
    }

    /// Returns the process id.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Returns the process name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current process state.
    pub fn state(&self) -> ProcessState {
        self.ctx
            .process_state(self.id)
            .unwrap_or(ProcessState::Cancelled)
    }

    /// Returns `true` if the process has terminated.
    pub fn is_terminated(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns a future which completes when the process terminates.
    pub fn join(&self) -> Wait {
        self.completion.wait()
    }

    /// Interrupts the process.
    ///
    /// A process which has not started yet is cancelled without running. A waiting process stops waiting and is
    /// resumed at the current time with [`SimError::Interrupted`](crate::SimError::Interrupted) carrying `cause`;
    /// if the process does not handle the error, it ends as [`ProcessState::Cancelled`]. Interrupting a terminated
    /// process has no effect.
    pub fn interrupt(&self, cause: &str) {
        self.ctx.interrupt(self.id, cause);
    }
}

impl IntoFuture for ProcessHandle {
    type Output = Result<(), crate::SimError>;
    type IntoFuture = Wait;

    fn into_future(self) -> Self::IntoFuture {
        self.join()
    }
}
