//! Simulation events.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::SimError;
use crate::process::ProcessId;
use crate::state::SimulationState;

/// Event identifier.
pub type EventId = u64;

/// Outcome delivered to processes awaiting an event.
pub type EventOutcome = Result<(), SimError>;

#[derive(Clone, Debug)]
pub(crate) enum EventStatus {
    Pending,
    Triggered(EventOutcome),
    Processed(EventOutcome),
}

pub(crate) struct Waiter {
    token: u64,
    process: Option<ProcessId>,
    waker: Waker,
}

/// Shared state of a single event: its status and the processes waiting for it, in the order they started to wait.
pub(crate) struct EventSlot {
    pub id: EventId,
    pub status: EventStatus,
    waiters: Vec<Waiter>,
}

pub(crate) type SlotRef = Rc<RefCell<EventSlot>>;

impl EventSlot {
    pub fn new(id: EventId) -> SlotRef {
        Rc::new(RefCell::new(Self {
            id,
            status: EventStatus::Pending,
            waiters: Vec::new(),
        }))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, EventStatus::Pending)
    }

    /// Registers a waiter or refreshes the waker of an already registered one, keeping its position.
    pub fn add_waiter(&mut self, token: u64, process: Option<ProcessId>, waker: &Waker) {
        match self.waiters.iter_mut().find(|w| w.token == token) {
            Some(waiter) => {
                if !waiter.waker.will_wake(waker) {
                    waiter.waker = waker.clone();
                }
            }
            None => self.waiters.push(Waiter {
                token,
                process,
                waker: waker.clone(),
            }),
        }
    }

    pub fn remove_waiter(&mut self, token: u64) {
        self.waiters.retain(|w| w.token != token);
    }

    pub fn remove_process(&mut self, process: ProcessId) {
        self.waiters.retain(|w| w.process != Some(process));
    }

    /// Marks the event as processed and hands out the wakers of all waiters.
    pub fn process(&mut self) -> Vec<Waker> {
        if let EventStatus::Triggered(outcome) = &self.status {
            self.status = EventStatus::Processed(outcome.clone());
        }
        self.waiters.drain(..).map(|w| w.waker).collect()
    }
}

/// Entry of the simulation event queue.
pub(crate) struct ScheduledEvent {
    pub time: f64,
    pub seq: u64,
    pub slot: SlotRef,
}

impl Eq for ScheduledEvent {}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handle to a one-shot event.
///
/// An event starts pending, is _triggered_ with an outcome at some simulation time and is _processed_ when the
/// simulation clock reaches that time. Processing resumes all processes awaiting the event in the order they started
/// to wait. Awaiting an already processed event completes immediately with its outcome.
///
/// Events are awaited either directly (`event.await`) or via [`Event::wait`].
#[derive(Clone)]
pub struct Event {
    slot: SlotRef,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl Event {
    pub(crate) fn new(slot: SlotRef, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self { slot, sim_state }
    }

    /// Returns the event identifier.
    pub fn id(&self) -> EventId {
        self.slot.borrow().id
    }

    /// Returns `true` if the event has been triggered (it may not be processed yet).
    pub fn is_triggered(&self) -> bool {
        !self.slot.borrow().is_pending()
    }

    /// Returns `true` if the event has been processed, i.e. its waiters have been resumed.
    pub fn is_processed(&self) -> bool {
        matches!(self.slot.borrow().status, EventStatus::Processed(_))
    }

    /// Triggers the event successfully at the current time.
    ///
    /// Returns `false` if the event was already triggered.
    pub fn succeed(&self) -> bool {
        self.trigger(Ok(()), 0.)
    }

    /// Triggers the event with a failure at the current time.
    ///
    /// Returns `false` if the event was already triggered.
    pub fn fail(&self, error: SimError) -> bool {
        self.trigger(Err(error), 0.)
    }

    pub(crate) fn trigger(&self, outcome: EventOutcome, delay: f64) -> bool {
        {
            let mut slot = self.slot.borrow_mut();
            if !slot.is_pending() {
                return false;
            }
            slot.status = EventStatus::Triggered(outcome);
        }
        let mut state = self.sim_state.borrow_mut();
        let time = state.time() + delay;
        state.push_event(self.slot.clone(), time);
        true
    }

    /// Returns a future which completes with the event outcome once the event is processed.
    pub fn wait(&self) -> Wait {
        Wait {
            event: self.clone(),
            token: None,
        }
    }
}

impl IntoFuture for Event {
    type Output = EventOutcome;
    type IntoFuture = Wait;

    fn into_future(self) -> Self::IntoFuture {
        Wait {
            event: self,
            token: None,
        }
    }
}

impl IntoFuture for &Event {
    type Output = EventOutcome;
    type IntoFuture = Wait;

    fn into_future(self) -> Self::IntoFuture {
        self.wait()
    }
}

/// Future returned by [`Event::wait`].
///
/// If the awaiting process is interrupted while waiting, the future completes with [`SimError::Interrupted`] and the
/// event no longer resumes this process.
pub struct Wait {
    event: Event,
    token: Option<u64>,
}

impl Future for Wait {
    type Output = EventOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut state = this.event.sim_state.borrow_mut();
        let process = state.active_process();

        if let Some(id) = process {
            if let Some(cause) = state.take_interrupt(id) {
                if let Some(token) = this.token.take() {
                    this.event.slot.borrow_mut().remove_waiter(token);
                }
                state.set_awaiting(id, None);
                return Poll::Ready(Err(SimError::Interrupted { cause }));
            }
        }

        let mut slot = this.event.slot.borrow_mut();
        if let EventStatus::Processed(outcome) = &slot.status {
            this.token = None;
            if let Some(id) = process {
                state.set_awaiting(id, None);
            }
            return Poll::Ready(outcome.clone());
        }

        let token = match this.token {
            Some(token) => token,
            None => {
                let token = state.next_token();
                this.token = Some(token);
                token
            }
        };
        slot.add_waiter(token, process, cx.waker());
        if let Some(id) = process {
            state.set_awaiting(id, Some(this.event.slot.clone()));
        }
        Poll::Pending
    }
}

impl Drop for Wait {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Ok(mut slot) = self.event.slot.try_borrow_mut() {
                slot.remove_waiter(token);
            }
        }
    }
}
