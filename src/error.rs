//! Errors reported by the simulation kernel.

use serde::Serialize;

use crate::process::ProcessId;

/// Result type returned by process bodies.
///
/// Any error type can be propagated from a process with `?`. Kernel errors keep their identity, so an unhandled
/// [`SimError::Interrupted`] ends the process as cancelled rather than failed.
pub type ProcessResult = Result<(), Box<dyn std::error::Error>>;

/// Error type of the simulation kernel.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum SimError {
    /// A timeout was requested with a negative (or NaN) duration.
    #[error("invalid timeout duration {duration}")]
    InvalidDuration {
        /// Requested duration.
        duration: f64,
    },
    /// An event was scheduled at a time before the current simulation time.
    #[error("cannot schedule event at {time}, current time is {now}")]
    PastEvent {
        /// Requested event time.
        time: f64,
        /// Simulation time at the moment of the request.
        now: f64,
    },
    /// A container request is negative or exceeds the container capacity.
    #[error("invalid amount {amount} for container of capacity {capacity}")]
    InvalidAmount {
        /// Requested amount.
        amount: f64,
        /// Capacity of the container.
        capacity: f64,
    },
    /// A container was created with a capacity which is not positive.
    #[error("invalid container capacity {capacity}")]
    InvalidCapacity {
        /// Requested capacity.
        capacity: f64,
    },
    /// A model configuration value is out of its valid range.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// Name of the configuration field.
        field: String,
        /// What is wrong with the value.
        reason: String,
    },
    /// A resource grant was released more than once.
    #[error("grant {grant} was already released")]
    DoubleRelease {
        /// Id of the released grant.
        grant: u64,
    },
    /// The awaiting process was interrupted.
    #[error("process interrupted: {cause}")]
    Interrupted {
        /// Cause passed to [`ProcessHandle::interrupt`](crate::ProcessHandle::interrupt).
        cause: String,
    },
    /// An awaited process terminated with an unhandled error.
    #[error("process {name} ({process}) failed: {message}")]
    ProcessFailed {
        /// Id of the failed process.
        process: ProcessId,
        /// Name of the failed process.
        name: String,
        /// Rendered error returned by the process body.
        message: String,
    },
}

impl SimError {
    /// Returns `true` for errors which indicate a defect in the model and abort the simulation run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::PastEvent { .. } | SimError::DoubleRelease { .. })
    }

    /// Returns `true` if this is an interruption signal.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, SimError::Interrupted { .. })
    }
}
