//! Example models built on the public kernel interfaces.
//!
//! - [`fuel_station`]: pumps modeled as a [`MonitoredResource`](crate::MonitoredResource) sharing a
//!   [`Container`](crate::Container) tank replenished by a tank truck.
//! - [`mm1`]: a single-server queue with statistics compared against the closed-form M/M/1 values.

pub mod fuel_station;
pub mod mm1;

pub use fuel_station::{run_fuel_station, FuelStation, FuelStationConfig, FuelStationReport};
pub use mm1::{run_mm1, Mm1Config, Mm1Queue, Mm1Report, Mm1Stats, Mm1Theory};

use crate::error::SimError;

fn invalid(field: &str, reason: &str) -> SimError {
    SimError::InvalidConfig {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Checks that a configuration value is positive and finite.
pub(crate) fn check_positive(field: &str, value: f64) -> Result<(), SimError> {
    if value.is_finite() && value > 0. {
        Ok(())
    } else {
        Err(invalid(field, &format!("must be positive, got {}", value)))
    }
}

/// Checks that a configuration value is non-negative and finite.
pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<(), SimError> {
    if value.is_finite() && value >= 0. {
        Ok(())
    } else {
        Err(invalid(field, &format!("must not be negative, got {}", value)))
    }
}

pub(crate) fn check(field: &str, valid: bool, reason: &str) -> Result<(), SimError> {
    if valid {
        Ok(())
    } else {
        Err(invalid(field, reason))
    }
}
