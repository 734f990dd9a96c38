//! Sampling random values for simulation models.

use std::cell::RefCell;

use rand::prelude::*;
use rand_distr::{Exp, Triangular};
use rand_pcg::Pcg64;

/// Source of the random draws used by simulation models.
///
/// Models receive a sampler explicitly, so each run owns its random state and runs with equal seeds are identical.
pub trait Sampler {
    /// Draws from the exponential distribution with the given mean.
    fn exponential(&self, mean: f64) -> f64;

    /// Draws from the triangular distribution on `[low, high]` with the given mode.
    fn triangular(&self, low: f64, mode: f64, high: f64) -> f64;

    /// Chooses one of `options` uniformly, returns `None` if there are no options.
    fn choose<'a, T>(&self, options: &'a [T]) -> Option<&'a T>;
}

/// Deterministic [`Sampler`] backed by the PCG generator.
pub struct SeededSampler {
    seed: u64,
    rand: RefCell<Pcg64>,
}

impl SeededSampler {
    /// Creates a sampler with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rand: RefCell::new(Pcg64::seed_from_u64(seed)),
        }
    }

    /// Returns the seed used to create the sampler.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns a random number in the specified range using the underlying generator.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.rand.borrow_mut().gen_range(range)
    }
}

impl Sampler for SeededSampler {
    /// # Panics
    ///
    /// Panics if `mean` is not positive.
    fn exponential(&self, mean: f64) -> f64 {
        match Exp::new(1. / mean) {
            Ok(dist) if mean > 0. => dist.sample(&mut *self.rand.borrow_mut()),
            _ => panic!("exponential mean must be positive, got {}", mean),
        }
    }

    /// # Panics
    ///
    /// Panics unless `low <= mode <= high`.
    fn triangular(&self, low: f64, mode: f64, high: f64) -> f64 {
        match Triangular::new(low, high, mode) {
            Ok(dist) => dist.sample(&mut *self.rand.borrow_mut()),
            Err(e) => panic!("invalid triangular distribution ({}, {}, {}): {}", low, mode, high, e),
        }
    }

    fn choose<'a, T>(&self, options: &'a [T]) -> Option<&'a T> {
        options.choose(&mut *self.rand.borrow_mut())
    }
}
