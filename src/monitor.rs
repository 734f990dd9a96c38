//! Resource wrapper recording queue length samples.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};

use crate::context::SimulationContext;
use crate::error::SimError;
use crate::resource::{Grant, Request, Resource};

/// Length of the resource wait queue observed at some simulation time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Simulation time.
    pub time: f64,
    /// Number of waiting requests.
    pub queue_len: usize,
}

/// A [`Resource`] which appends a [`Sample`] to its log on every request and release, before performing the
/// operation. Apart from that it behaves exactly like the wrapped resource.
#[derive(Clone)]
pub struct MonitoredResource {
    resource: Resource,
    samples: Rc<RefCell<Vec<Sample>>>,
    ctx: SimulationContext,
}

impl MonitoredResource {
    /// Creates a monitored resource with the given number of slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(ctx: &SimulationContext, capacity: usize) -> Self {
        Self {
            resource: Resource::new(ctx, capacity),
            samples: Rc::new(RefCell::new(Vec::new())),
            ctx: ctx.clone(),
        }
    }

    /// Returns the wrapped resource.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.resource.capacity()
    }

    /// Returns the number of granted slots.
    pub fn count(&self) -> usize {
        self.resource.count()
    }

    /// Returns the number of waiting requests.
    pub fn queue_len(&self) -> usize {
        self.resource.queue_len()
    }

    /// Records a sample and requests a slot. See [`Resource::request`].
    pub fn request(&self) -> MonitoredRequest {
        self.record();
        MonitoredRequest {
            request: self.resource.request(),
            monitor: self.clone(),
        }
    }

    /// Records a sample and releases the grant. See [`Resource::release`].
    pub fn release(&self, grant: &MonitoredGrant) -> Result<(), SimError> {
        self.record();
        self.resource.release(&grant.grant)
    }

    /// Returns a copy of the recorded samples.
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.borrow().clone()
    }

    fn record(&self) {
        let sample = Sample {
            time: self.ctx.time(),
            queue_len: self.resource.queue_len(),
        };
        self.samples.borrow_mut().push(sample);
    }
}

/// Future returned by [`MonitoredResource::request`].
pub struct MonitoredRequest {
    request: Request,
    monitor: MonitoredResource,
}

impl Future for MonitoredRequest {
    type Output = Result<MonitoredGrant, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.request).poll(cx) {
            Poll::Ready(Ok(grant)) => Poll::Ready(Ok(MonitoredGrant {
                grant,
                monitor: this.monitor.clone(),
            })),
            Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A slot granted by a [`MonitoredResource`]. Dropping a held grant records a sample and releases the slot.
pub struct MonitoredGrant {
    grant: Grant,
    monitor: MonitoredResource,
}

impl MonitoredGrant {
    /// Returns the grant id.
    pub fn id(&self) -> u64 {
        self.grant.id()
    }

    /// Returns `true` until the grant is released.
    pub fn is_held(&self) -> bool {
        self.grant.is_held()
    }
}

impl Drop for MonitoredGrant {
    fn drop(&mut self) {
        if self.grant.is_held() {
            self.monitor.record();
        }
    }
}
