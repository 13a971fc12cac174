//! FIFO of tasks plus the lifecycle state of the loop that drains it.
//!
//! The state lives under the same lock as the tasks so the consumer's
//! "empty and still open" check and the producer's wake-up cannot race.
//! Two condition variables keep the consumer and join-style waiters on
//! separate wake-ups: a push wakes only the consumer.

use super::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::{TryReserveError, VecDeque};

pub(crate) struct Slot<S> {
    pub(crate) tasks: VecDeque<Task>,
    pub(crate) state: S,
}

pub(crate) struct TaskQueue<S> {
    slot: Mutex<Slot<S>>,
    available: Condvar,
    settled: Condvar,
}

impl<S> TaskQueue<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            slot: Mutex::new(Slot {
                tasks: VecDeque::new(),
                state,
            }),
            available: Condvar::new(),
            settled: Condvar::new(),
        }
    }

    /// Append to the tail. On allocation failure the task is dropped.
    pub(crate) fn push(&self, task: Task) -> Result<(), TryReserveError> {
        {
            let mut slot = self.slot.lock();
            slot.tasks.try_reserve(1)?;
            slot.tasks.push_back(task);
        }
        self.available.notify_one();
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.slot.lock().tasks.len()
    }

    /// Pop the head task, blocking while the queue is empty and `open` holds.
    /// Returns `None` as soon as `open` is false, even if tasks remain.
    pub(crate) fn next(&self, open: impl Fn(&S) -> bool) -> Option<Task> {
        let mut slot = self.slot.lock();
        loop {
            if !open(&slot.state) {
                return None;
            }
            if let Some(task) = slot.tasks.pop_front() {
                return Some(task);
            }
            self.available.wait(&mut slot);
        }
    }

    /// Change the state under the lock, then wake the consumer and every waiter.
    pub(crate) fn transition<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let result = f(&mut self.slot.lock().state);
        self.available.notify_all();
        self.settled.notify_all();
        result
    }

    /// Block until `pred` holds for the state.
    pub(crate) fn wait_until(&self, pred: impl Fn(&S) -> bool) {
        let mut slot = self.slot.lock();
        while !pred(&slot.state) {
            self.settled.wait(&mut slot);
        }
    }

    pub(crate) fn inspect<R>(&self, f: impl FnOnce(&Slot<S>) -> R) -> R {
        f(&self.slot.lock())
    }
}
