//! Unit-of-work representation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type TaskFn = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

/// A queued closure. Whoever pops it owns it; running it consumes it.
pub struct Task {
    pub(crate) id: TaskId,
    func: TaskFn,
    pub(crate) enqueued_at: Instant,
}

impl Task {
    /// Wrap an infallible closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::from_fn(Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// Wrap a closure whose `Err` is reported the same way a panic is.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        Self::from_fn(Box::new(move || f().map_err(|e| e.to_string())))
    }

    fn from_fn(func: TaskFn) -> Self {
        Task {
            id: TaskId::next(),
            func,
            enqueued_at: Instant::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Execute the task
    pub(crate) fn run(self) -> Result<(), String> {
        (self.func)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}
