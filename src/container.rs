//! Bounded reservoir of a continuous quantity.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::context::SimulationContext;
use crate::error::SimError;
use crate::event::{Event, Wait};
use crate::state::EPSILON;

struct Operation {
    id: u64,
    amount: f64,
    // None for an operation returning the amount of an abandoned one.
    event: Option<Event>,
}

struct ContainerState {
    capacity: f64,
    level: f64,
    gets: VecDeque<Operation>,
    puts: VecDeque<Operation>,
    next_id: u64,
}

impl ContainerState {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// A reservoir holding a continuous amount between zero and its capacity.
///
/// [`Container::get`] waits until enough of the quantity is available, [`Container::put`] waits until there is enough
/// room. Gets and puts are served in arrival order within their own queues: a request waits while an earlier request of
/// the same kind is waiting, even if it could be satisfied. Whenever a put adds to the level the waiting gets are
/// re-evaluated, and whenever a get frees room the waiting puts are re-evaluated.
#[derive(Clone)]
pub struct Container {
    state: Rc<RefCell<ContainerState>>,
    ctx: SimulationContext,
}

impl Container {
    /// Creates an empty container.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not positive.
    pub fn new(ctx: &SimulationContext, capacity: f64) -> Self {
        assert!(capacity > 0., "container capacity must be positive");
        Self {
            state: Rc::new(RefCell::new(ContainerState {
                capacity,
                level: 0.,
                gets: VecDeque::new(),
                puts: VecDeque::new(),
                next_id: 0,
            })),
            ctx: ctx.clone(),
        }
    }

    /// Creates a container with the initial `level`, which must be within `[0, capacity]`.
    ///
    /// Fails with [`SimError::InvalidCapacity`] if `capacity` is not positive.
    pub fn with_level(ctx: &SimulationContext, capacity: f64, level: f64) -> Result<Self, SimError> {
        if capacity.is_nan() || capacity <= 0. {
            return Err(SimError::InvalidCapacity { capacity });
        }
        let container = Self::new(ctx, capacity);
        container.check_amount(level)?;
        container.state.borrow_mut().level = level;
        Ok(container)
    }

    /// Returns the container capacity.
    pub fn capacity(&self) -> f64 {
        self.state.borrow().capacity
    }

    /// Returns the current level.
    pub fn level(&self) -> f64 {
        self.state.borrow().level
    }

    /// Returns the number of waiting gets.
    pub fn get_queue_len(&self) -> usize {
        self.state.borrow().gets.len()
    }

    /// Returns the number of waiting puts.
    pub fn put_queue_len(&self) -> usize {
        self.state.borrow().puts.len()
    }

    /// Requests `amount` from the container.
    ///
    /// Fails with [`SimError::InvalidAmount`] if `amount` is negative or exceeds the capacity. The returned future
    /// yields the amount once it has been taken from the container. Dropping the future before that withdraws the
    /// get: a waiting get leaves the queue, and the amount of an already served get is returned to the container.
    pub fn get(&self, amount: f64) -> Result<ContainerGet, SimError> {
        self.check_amount(amount)?;
        let event = self.ctx.event();
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.gets.push_back(Operation {
                id,
                amount,
                event: Some(event.clone()),
            });
            id
        };
        self.serve(true);
        Ok(ContainerGet {
            op: PendingOperation::new(self.clone(), id, amount, &event, true),
        })
    }

    /// Adds `amount` to the container.
    ///
    /// Fails with [`SimError::InvalidAmount`] if `amount` is negative or exceeds the capacity. The returned future
    /// yields the amount once it has been added. Dropping the future before that withdraws the put: a waiting put
    /// leaves the queue, and the amount of an already served put is taken out again.
    pub fn put(&self, amount: f64) -> Result<ContainerPut, SimError> {
        self.check_amount(amount)?;
        let event = self.ctx.event();
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.puts.push_back(Operation {
                id,
                amount,
                event: Some(event.clone()),
            });
            id
        };
        self.serve(false);
        Ok(ContainerPut {
            op: PendingOperation::new(self.clone(), id, amount, &event, false),
        })
    }

    fn check_amount(&self, amount: f64) -> Result<(), SimError> {
        let capacity = self.capacity();
        if amount.is_nan() || amount < 0. || amount > capacity {
            return Err(SimError::InvalidAmount { amount, capacity });
        }
        Ok(())
    }

    /// Serves gets and puts alternately, starting with the given kind, until neither queue makes progress.
    fn serve(&self, mut gets: bool) {
        loop {
            let progressed = if gets { self.serve_gets() } else { self.serve_puts() };
            if !progressed {
                break;
            }
            gets = !gets;
        }
    }

    fn serve_gets(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let mut progressed = false;
        while let Some(amount) = state.gets.front().map(|op| op.amount) {
            if state.level + EPSILON < amount {
                break;
            }
            state.level = (state.level - amount).max(0.);
            if let Some(event) = state.gets.pop_front().and_then(|op| op.event) {
                event.succeed();
            }
            progressed = true;
        }
        progressed
    }

    fn serve_puts(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let mut progressed = false;
        while let Some(amount) = state.puts.front().map(|op| op.amount) {
            if state.level + amount > state.capacity + EPSILON {
                break;
            }
            state.level = (state.level + amount).min(state.capacity);
            if let Some(event) = state.puts.pop_front().and_then(|op| op.event) {
                event.succeed();
            }
            progressed = true;
        }
        progressed
    }

    fn withdraw(&self, id: u64, amount: f64, get: bool) {
        let queued = {
            let mut state = self.state.borrow_mut();
            let queue = if get { &mut state.gets } else { &mut state.puts };
            queue.iter().position(|op| op.id == id).map(|pos| {
                queue.remove(pos);
                pos == 0
            })
        };
        match queued {
            Some(true) => self.serve(get),
            Some(false) => {}
            None => self.restore(amount, get),
        }
    }

    /// Returns the amount of a served operation whose result was never received.
    ///
    /// The amount of an abandoned get is put back and the amount of an abandoned put is taken out again. The returning
    /// operation goes to the head of the opposite queue, so it waits if the level has changed since.
    fn restore(&self, amount: f64, get: bool) {
        {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            let op = Operation { id, amount, event: None };
            if get {
                state.puts.push_front(op);
            } else {
                state.gets.push_front(op);
            }
        }
        self.serve(!get);
    }
}

struct PendingOperation {
    container: Container,
    id: u64,
    amount: f64,
    wait: Wait,
    get: bool,
    done: bool,
}

impl PendingOperation {
    fn new(container: Container, id: u64, amount: f64, event: &Event, get: bool) -> Self {
        Self {
            container,
            id,
            amount,
            wait: event.wait(),
            get,
            done: false,
        }
    }

    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Result<f64, SimError>> {
        match Pin::new(&mut self.wait).poll(cx) {
            Poll::Ready(Ok(())) => {
                self.done = true;
                Poll::Ready(Ok(self.amount))
            }
            Poll::Ready(Err(error)) => Poll::Ready(Err(error)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingOperation {
    fn drop(&mut self) {
        if !self.done {
            self.container.withdraw(self.id, self.amount, self.get);
        }
    }
}

/// Future returned by [`Container::get`], yields the taken amount.
pub struct ContainerGet {
    op: PendingOperation,
}

impl Future for ContainerGet {
    type Output = Result<f64, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().op.poll(cx)
    }
}

/// Future returned by [`Container::put`], yields the added amount.
pub struct ContainerPut {
    op: PendingOperation,
}

impl Future for ContainerPut {
    type Output = Result<f64, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().op.poll(cx)
    }
}
