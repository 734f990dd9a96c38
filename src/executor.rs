//! Single-threaded executor driving process futures.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::task::Waker;

use futures::future::LocalBoxFuture;
use futures::task::{waker, ArcWake};
use rustc_hash::FxHashMap;

use crate::error::ProcessResult;
use crate::process::ProcessId;

pub(crate) struct Task {
    pub future: LocalBoxFuture<'static, ProcessResult>,
    pub waker: Waker,
}

struct TaskWaker {
    process: ProcessId,
    sender: Sender<ProcessId>,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        // The receiver lives as long as the simulation, a failed send means it is being dropped.
        let _ = arc_self.sender.send(arc_self.process);
    }
}

/// Stores suspended processes and the queue of processes ready to be polled.
///
/// Waking a process enqueues its id, so processes resumed by the same event are polled in the order of their wakers.
pub(crate) struct Executor {
    tasks: FxHashMap<ProcessId, Task>,
    sender: Sender<ProcessId>,
    ready: Receiver<ProcessId>,
}

impl Executor {
    pub fn new() -> Self {
        let (sender, ready) = channel();
        Self {
            tasks: FxHashMap::default(),
            sender,
            ready,
        }
    }

    /// Stores the process future and returns the waker resuming it.
    pub fn spawn(&mut self, id: ProcessId, future: LocalBoxFuture<'static, ProcessResult>) -> Waker {
        let waker = self.waker(id);
        self.tasks.insert(
            id,
            Task {
                future,
                waker: waker.clone(),
            },
        );
        waker
    }

    pub fn waker(&self, id: ProcessId) -> Waker {
        waker(Arc::new(TaskWaker {
            process: id,
            sender: self.sender.clone(),
        }))
    }

    pub fn next_ready(&self) -> Option<ProcessId> {
        self.ready.try_recv().ok()
    }

    /// Takes the task out for polling. Returns `None` for terminated processes.
    pub fn take(&mut self, id: ProcessId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn restore(&mut self, id: ProcessId, task: Task) {
        self.tasks.insert(id, task);
    }

    /// Removes all stored tasks.
    pub fn drain(&mut self) -> Vec<Task> {
        self.tasks.drain().map(|(_, task)| task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_order() {
        let mut executor = Executor::new();
        let w1 = executor.spawn(1, Box::pin(async { Ok(()) }));
        let w2 = executor.spawn(2, Box::pin(async { Ok(()) }));
        w2.wake_by_ref();
        w1.wake_by_ref();
        w2.wake();
        assert_eq!(executor.next_ready(), Some(2));
        assert_eq!(executor.next_ready(), Some(1));
        assert_eq!(executor.next_ready(), Some(2));
        assert_eq!(executor.next_ready(), None);
        assert!(executor.take(1).is_some());
        assert!(executor.take(1).is_none());
        assert_eq!(executor.drain().len(), 1);
    }
}
