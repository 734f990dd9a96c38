use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::error::SimError;
use crate::event::{EventId, EventOutcome, EventSlot, EventStatus, ScheduledEvent, SlotRef};
use crate::process::{ProcessFailure, ProcessId, ProcessState};

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

pub(crate) struct ProcessRecord {
    pub name: String,
    pub state: ProcessState,
    pub awaiting: Option<SlotRef>,
    pub completion: SlotRef,
}

pub(crate) struct SimulationState {
    clock: f64,
    events: BinaryHeap<ScheduledEvent>,
    event_seq: u64,
    event_count: u64,
    next_event_id: EventId,
    next_token: u64,
    processes: FxHashMap<ProcessId, ProcessRecord>,
    // Terminated processes keep only their final state.
    terminated: FxHashMap<ProcessId, ProcessState>,
    next_process_id: ProcessId,
    active_process: Option<ProcessId>,
    interrupts: FxHashMap<ProcessId, String>,
    failures: Vec<ProcessFailure>,
    fatal: Option<SimError>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            clock: 0.0,
            events: BinaryHeap::new(),
            event_seq: 0,
            event_count: 0,
            next_event_id: 0,
            next_token: 0,
            processes: FxHashMap::default(),
            terminated: FxHashMap::default(),
            next_process_id: 0,
            active_process: None,
            interrupts: FxHashMap::default(),
            failures: Vec::new(),
            fatal: None,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn set_time(&mut self, time: f64) {
        debug_assert!(time >= self.clock, "simulation time cannot go backwards");
        self.clock = time;
    }

    // Events ----------------------------------------------------------------------------------------------------------

    pub fn new_slot(&mut self) -> SlotRef {
        let id = self.next_event_id;
        self.next_event_id += 1;
        EventSlot::new(id)
    }

    pub fn next_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    /// Pushes an already triggered event to the queue.
    pub fn push_event(&mut self, slot: SlotRef, time: f64) {
        debug_assert!(time >= self.clock, "event is scheduled in the past");
        let seq = self.event_seq;
        self.event_seq += 1;
        self.events.push(ScheduledEvent { time, seq, slot });
    }

    /// Triggers a pending event with `outcome` at the current time.
    pub fn trigger_now(&mut self, slot: &SlotRef, outcome: EventOutcome) {
        {
            let mut slot = slot.borrow_mut();
            if !slot.is_pending() {
                return;
            }
            slot.status = EventStatus::Triggered(outcome);
        }
        self.push_event(slot.clone(), self.clock);
    }

    /// Checks that an event can be scheduled at `time`, recording a fatal error if it is in the past.
    pub fn check_time(&mut self, time: f64) -> Result<(), SimError> {
        if time.is_nan() || time < self.clock {
            let error = SimError::PastEvent { time, now: self.clock };
            self.report_fatal(error.clone());
            return Err(error);
        }
        Ok(())
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.events.peek().map(|e| e.time)
    }

    /// Removes the next event from the queue, advances the clock to its time and returns the wakers of its waiters.
    pub fn next_event(&mut self) -> Option<Vec<std::task::Waker>> {
        let next = self.events.pop()?;
        debug_assert!(next.time >= self.clock, "event queue returned an event from the past");
        self.clock = next.time;
        self.event_count += 1;
        let wakers = next.slot.borrow_mut().process();
        Some(wakers)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    // Processes -------------------------------------------------------------------------------------------------------

    /// Registers a new process, returning its id and start event slot.
    pub fn register_process(&mut self, name: &str) -> (ProcessId, SlotRef) {
        let id = self.next_process_id;
        self.next_process_id += 1;
        let start = self.new_slot();
        let completion = self.new_slot();
        self.processes.insert(
            id,
            ProcessRecord {
                name: name.to_owned(),
                state: ProcessState::Created,
                awaiting: Some(start.clone()),
                completion,
            },
        );
        (id, start)
    }

    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        match self.processes.get(&id) {
            Some(process) => Some(process.state),
            None => self.terminated.get(&id).copied(),
        }
    }

    pub fn process_name(&self, id: ProcessId) -> String {
        self.processes.get(&id).map(|p| p.name.clone()).unwrap_or_default()
    }

    pub fn active_process(&self) -> Option<ProcessId> {
        self.active_process
    }

    pub fn on_resume(&mut self, id: ProcessId) {
        self.active_process = Some(id);
        if let Some(process) = self.processes.get_mut(&id) {
            process.state = ProcessState::Running;
        }
    }

    pub fn on_suspend(&mut self, id: ProcessId) {
        self.active_process = None;
        if let Some(process) = self.processes.get_mut(&id) {
            process.state = ProcessState::Waiting;
        }
    }

    pub fn set_awaiting(&mut self, id: ProcessId, slot: Option<SlotRef>) {
        if let Some(process) = self.processes.get_mut(&id) {
            process.awaiting = slot;
        }
    }

    /// Removes the process from the waiters of the event it currently awaits.
    pub fn detach(&mut self, id: ProcessId) {
        if let Some(slot) = self.processes.get_mut(&id).and_then(|p| p.awaiting.take()) {
            slot.borrow_mut().remove_process(id);
        }
    }

    /// Marks the process as terminated and triggers its completion event.
    pub fn complete_process(&mut self, id: ProcessId, state: ProcessState, outcome: EventOutcome) {
        self.interrupts.remove(&id);
        if self.active_process == Some(id) {
            self.active_process = None;
        }
        let Some(process) = self.processes.remove(&id) else {
            return;
        };
        self.terminated.insert(id, state);
        self.trigger_now(&process.completion, outcome);
    }

    pub fn completion(&self, id: ProcessId) -> Option<SlotRef> {
        self.processes.get(&id).map(|p| p.completion.clone())
    }

    /// Records a pending interrupt, returns `false` if the process already has one.
    pub fn request_interrupt(&mut self, id: ProcessId, cause: &str) -> bool {
        if self.interrupts.contains_key(&id) {
            return false;
        }
        self.interrupts.insert(id, cause.to_owned());
        true
    }

    pub fn take_interrupt(&mut self, id: ProcessId) -> Option<String> {
        self.interrupts.remove(&id)
    }

    pub fn add_failure(&mut self, failure: ProcessFailure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[ProcessFailure] {
        &self.failures
    }

    // Fatal errors ----------------------------------------------------------------------------------------------------

    pub fn report_fatal(&mut self, error: SimError) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub fn take_fatal(&mut self) -> Option<SimError> {
        self.fatal.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_follows_events() {
        let mut state = SimulationState::new();
        for time in [3., 1., 2., 1.] {
            let slot = state.new_slot();
            slot.borrow_mut().status = EventStatus::Triggered(Ok(()));
            state.push_event(slot, time);
        }
        let mut times = Vec::new();
        while state.next_event().is_some() {
            times.push(state.time());
        }
        assert_eq!(times, vec![1., 1., 2., 3.]);
        assert_eq!(state.event_count(), 4);
        assert!(!state.has_events());
    }

    #[test]
    fn test_terminated_process_keeps_state_only() {
        let mut state = SimulationState::new();
        let (id, _start) = state.register_process("worker");
        let completion = state.completion(id).unwrap();
        assert_eq!(state.process_state(id), Some(ProcessState::Created));

        state.complete_process(id, ProcessState::Finished, Ok(()));
        assert_eq!(state.process_state(id), Some(ProcessState::Finished));
        assert!(state.completion(id).is_none());
        assert!(!state.processes.contains_key(&id));
        assert!(!completion.borrow().is_pending());

        // Completing again has no effect
        state.complete_process(id, ProcessState::Failed, Ok(()));
        assert_eq!(state.process_state(id), Some(ProcessState::Finished));
    }

    #[test]
    fn test_past_time_is_fatal() {
        let mut state = SimulationState::new();
        state.set_time(5.);
        assert!(state.check_time(5.).is_ok());
        assert_eq!(
            state.check_time(4.),
            Err(SimError::PastEvent { time: 4., now: 5. })
        );
        assert!(state.take_fatal().is_some());
        assert!(state.take_fatal().is_none());
    }
}
