// worker thread + its private queue
use super::panic_handler::PanicHandler;
use super::queue::TaskQueue;
use super::task::Task;
use crate::config::Config;
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WorkerState {
    Idle,
    Running,
    /// Stop requested; the task in flight (if any) is finishing.
    Stopping,
    Finished,
}

// stats for each worker
#[derive(Debug, Default)]
struct WorkerCounters {
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    busy_time_ns: AtomicU64,
}

/// Point-in-time view of a worker, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WorkerStatus {
    pub name: String,
    pub state: WorkerState,
    pub queued: usize,
    pub executed: u64,
    pub failed: u64,
    pub busy_time_ns: u64,
}

struct Shared {
    name: RwLock<String>,
    queue: TaskQueue<WorkerState>,
    counters: WorkerCounters,
    panic_handler: PanicHandler,
    thread_id: OnceLock<ThreadId>,
    tag_name_with_thread: bool,
}

impl Shared {
    fn on_worker_thread(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }

    // main loop
    fn run(&self) {
        let thread_id = thread::current().id();
        let _ = self.thread_id.set(thread_id);

        if self.tag_name_with_thread {
            let mut name = self.name.write();
            let tagged = format!("{} ({:?})", *name, thread_id);
            *name = tagged;
        }

        let name = self.name.read().clone();
        tracing::debug!(worker = %name, "worker started");

        while let Some(task) = self.queue.next(|state| *state == WorkerState::Running) {
            self.execute(task, &name);
        }

        let discarded = self.queue.len();
        self.queue.transition(|state| *state = WorkerState::Finished);

        tracing::debug!(
            worker = %name,
            executed = self.counters.tasks_executed.load(Ordering::Relaxed),
            discarded,
            "worker finished"
        );
    }

    fn execute(&self, task: Task, name: &str) {
        let start = Instant::now();
        tracing::trace!(
            worker = name,
            task = %task.id(),
            waited_us = task.enqueued_at.elapsed().as_micros() as u64,
            "running task"
        );

        if self.panic_handler.run_task(task, name).is_err() {
            self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }

        self.counters
            .busy_time_ns
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
        self.counters.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}

/// One dedicated thread draining one FIFO queue.
///
/// Tasks run one at a time in the order they were added. [`stop`](Worker::stop)
/// lets the task in flight finish, discards whatever is still queued, and joins
/// the thread. Dropping a worker stops it.
pub struct Worker {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    stack_size: Option<usize>,
}

impl Worker {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_config(name, &Config::default())
    }

    pub fn with_config<S: Into<String>>(name: S, config: &Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: RwLock::new(name.into()),
                queue: TaskQueue::new(WorkerState::Idle),
                counters: WorkerCounters::default(),
                panic_handler: PanicHandler::new(config.panic_strategy),
                thread_id: OnceLock::new(),
                tag_name_with_thread: config.tag_names_with_thread,
            }),
            thread: Mutex::new(None),
            stack_size: config.stack_size,
        }
    }

    /// Spawn the worker thread. Calling this again while running, or after
    /// the worker finished, does nothing.
    pub fn start(&self) -> Result<()> {
        let previous = self.shared.queue.transition(|state| {
            let previous = *state;
            if previous == WorkerState::Idle {
                *state = WorkerState::Running;
            }
            previous
        });

        match previous {
            WorkerState::Idle => {}
            WorkerState::Running | WorkerState::Stopping => return Ok(()),
            WorkerState::Finished => {
                tracing::debug!(worker = %self.worker_name(), "start ignored, worker already finished");
                return Ok(());
            }
        }

        let shared = Arc::clone(&self.shared);
        let mut builder = thread::Builder::new().name(thread_name(&self.worker_name()));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        match builder.spawn(move || shared.run()) {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.queue.transition(|state| {
                    *state = match *state {
                        WorkerState::Stopping => WorkerState::Finished,
                        _ => WorkerState::Idle,
                    };
                });
                Err(Error::Spawn(e))
            }
        }
    }

    /// Request termination and block until the worker thread has exited.
    ///
    /// Safe on a worker that was never started. Called from a task running on
    /// this worker it only requests termination; the join happens later.
    pub fn stop(&self) {
        let previous = self.shared.queue.transition(|state| {
            let previous = *state;
            *state = match previous {
                WorkerState::Idle | WorkerState::Finished => WorkerState::Finished,
                WorkerState::Running | WorkerState::Stopping => WorkerState::Stopping,
            };
            previous
        });

        if previous == WorkerState::Running {
            tracing::debug!(worker = %self.worker_name(), "stop requested");
        }

        if self.shared.on_worker_thread() {
            return;
        }

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(worker = %self.worker_name(), "worker thread panicked");
            }
        }

        self.wait_for_finished();
    }

    /// Block until the worker loop has exited. Returns at once if the worker
    /// never started.
    pub fn wait_for_finished(&self) {
        if self.shared.on_worker_thread() {
            tracing::warn!(worker = %self.worker_name(), "wait_for_finished called from the worker's own thread");
            return;
        }

        self.shared
            .queue
            .wait_until(|state| matches!(state, WorkerState::Idle | WorkerState::Finished));
    }

    pub fn add_task<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push_task(Task::new(f));
    }

    /// Like [`add_task`](Worker::add_task); an `Err` is logged and counted as a failure.
    pub fn add_fallible_task<F, E>(&self, f: F)
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        self.push_task(Task::fallible(f));
    }

    /// Append a prepared task. Never fails from the caller's point of view:
    /// if the queue cannot grow, the task is logged and dropped.
    pub fn push_task(&self, task: Task) {
        let id = task.id();
        if let Err(e) = self.shared.queue.push(task) {
            tracing::error!(
                worker = %self.worker_name(),
                task = %id,
                error = %e,
                "dropping task, queue allocation failed"
            );
        }
    }

    /// Current queue length. Already stale by the time the caller reads it.
    pub fn tasks_count(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn set_worker_name<S: Into<String>>(&self, name: S) {
        *self.shared.name.write() = name.into();
    }

    pub fn worker_name(&self) -> String {
        self.shared.name.read().clone()
    }

    pub fn state(&self) -> WorkerState {
        self.shared.queue.inspect(|slot| slot.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state() == WorkerState::Finished
    }

    pub fn status(&self) -> WorkerStatus {
        let (state, queued) = self
            .shared
            .queue
            .inspect(|slot| (slot.state, slot.tasks.len()));
        let counters = &self.shared.counters;

        WorkerStatus {
            name: self.worker_name(),
            state,
            queued,
            executed: counters.tasks_executed.load(Ordering::Relaxed),
            failed: counters.tasks_failed.load(Ordering::Relaxed),
            busy_time_ns: counters.busy_time_ns.load(Ordering::Relaxed),
        }
    }
}

fn thread_name(name: &str) -> String {
    name.replace('\0', "")
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, queued) = self
            .shared
            .queue
            .inspect(|slot| (slot.state, slot.tasks.len()));
        f.debug_struct("Worker")
            .field("name", &self.worker_name())
            .field("state", &state)
            .field("queued", &queued)
            .finish()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
