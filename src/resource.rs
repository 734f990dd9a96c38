//! Capacity-limited resource with a FIFO wait queue.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use rustc_hash::FxHashSet;

use crate::context::SimulationContext;
use crate::error::SimError;
use crate::event::{Event, Wait};

struct ResourceState {
    capacity: usize,
    users: FxHashSet<u64>,
    queue: VecDeque<(u64, Event)>,
    next_request: u64,
}

/// A pool of `capacity` identical slots shared by processes.
///
/// A process acquires a slot by awaiting [`Resource::request`], which yields a [`Grant`]. Requests are granted
/// strictly in arrival order: a request waits while any earlier request is still waiting. Dropping the grant releases
/// the slot, so a slot is returned on every exit path of the process, including errors and interruptions.
///
/// # Example
///
/// ```rust
/// use procsim::{Resource, Simulation};
///
/// let mut sim = Simulation::new();
/// let ctx = sim.create_context("clerk");
/// let desk = Resource::new(&ctx, 1);
/// for i in 0..2 {
///     let (ctx, desk) = (ctx.clone(), desk.clone());
///     ctx.clone().spawn(&format!("customer {}", i), async move {
///         let _grant = desk.request().await?;
///         ctx.timeout(3.)?.await?;
///         Ok(())
///     });
/// }
/// sim.step_until_no_events().unwrap();
/// assert_eq!(sim.time(), 6.);
/// ```
#[derive(Clone)]
pub struct Resource {
    state: Rc<RefCell<ResourceState>>,
    ctx: SimulationContext,
}

impl Resource {
    /// Creates a resource with the given number of slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(ctx: &SimulationContext, capacity: usize) -> Self {
        assert!(capacity > 0, "resource capacity must be positive");
        Self {
            state: Rc::new(RefCell::new(ResourceState {
                capacity,
                users: FxHashSet::default(),
                queue: VecDeque::new(),
                next_request: 0,
            })),
            ctx: ctx.clone(),
        }
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Returns the number of granted slots.
    pub fn count(&self) -> usize {
        self.state.borrow().users.len()
    }

    /// Returns the number of requests waiting to be granted.
    pub fn queue_len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Requests a slot.
    ///
    /// The request is enqueued immediately; if a slot is free and no earlier request is waiting, it is granted at
    /// the current time. The returned future yields the grant once the request is granted. Dropping the future before
    /// that withdraws the request.
    pub fn request(&self) -> Request {
        let event = self.ctx.event();
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_request;
            state.next_request += 1;
            state.queue.push_back((id, event.clone()));
            id
        };
        self.grant_waiting();
        Request {
            resource: self.clone(),
            id,
            wait: event.wait(),
            granted: false,
        }
    }

    /// Releases the slot held by `grant` and grants it to the first waiting request.
    ///
    /// Releasing a grant twice fails with [`SimError::DoubleRelease`], leaves the resource unchanged and aborts the
    /// running simulation step.
    pub fn release(&self, grant: &Grant) -> Result<(), SimError> {
        debug_assert!(Rc::ptr_eq(&self.state, &grant.resource.state), "grant belongs to another resource");
        if grant.resource.release_slot(grant.id) {
            Ok(())
        } else {
            let error = SimError::DoubleRelease { grant: grant.id };
            self.ctx.report_fatal(error.clone());
            Err(error)
        }
    }

    fn holds(&self, id: u64) -> bool {
        self.state.borrow().users.contains(&id)
    }

    fn release_slot(&self, id: u64) -> bool {
        let released = self.state.borrow_mut().users.remove(&id);
        if released {
            self.grant_waiting();
        }
        released
    }

    fn withdraw(&self, id: u64) {
        let queued = {
            let mut state = self.state.borrow_mut();
            let len = state.queue.len();
            state.queue.retain(|(request, _)| *request != id);
            state.queue.len() != len
        };
        if !queued {
            // Granted, but the grant was never handed out.
            self.release_slot(id);
        }
    }

    fn grant_waiting(&self) {
        let mut state = self.state.borrow_mut();
        while state.users.len() < state.capacity {
            let Some((id, event)) = state.queue.pop_front() else {
                break;
            };
            state.users.insert(id);
            event.succeed();
        }
    }
}

/// Future returned by [`Resource::request`].
pub struct Request {
    resource: Resource,
    id: u64,
    wait: Wait,
    granted: bool,
}

impl Request {
    /// Returns the request id, which is also the id of the resulting grant.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for Request {
    type Output = Result<Grant, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.wait).poll(cx) {
            Poll::Ready(Ok(())) => {
                this.granted = true;
                Poll::Ready(Ok(Grant {
                    resource: this.resource.clone(),
                    id: this.id,
                }))
            }
            Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if !self.granted {
            self.resource.withdraw(self.id);
        }
    }
}

/// A granted resource slot. Dropping the grant releases the slot if it was not released explicitly.
pub struct Grant {
    resource: Resource,
    id: u64,
}

impl Grant {
    /// Returns the grant id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `true` until the grant is released.
    pub fn is_held(&self) -> bool {
        self.resource.holds(self.id)
    }
}

impl Drop for Grant {
    fn drop(&mut self) {
        self.resource.release_slot(self.id);
    }
}
