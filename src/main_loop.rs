//! Event loop on a dedicated thread, with ordered shutdown.
//!
//! Events run one at a time in posting order. Shutdown goes through
//! [`MainLoop::quit`]: every on-quit callback runs, in registration order,
//! before the running flag clears. [`MainLoop::wait`] joins the loop thread
//! and hands back the exit code.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::queue::TaskQueue;
use crate::executor::{PanicHandler, Task};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LoopPhase {
    Idle,
    Running,
    /// `quit` is running on-quit callbacks; events are still processed.
    Draining,
    /// Running flag cleared; the loop thread is exiting or gone.
    Stopped,
    /// `wait` has joined the loop thread.
    Joined,
}

struct Control {
    phase: LoopPhase,
    spawned: bool,
}

#[derive(Debug, Default)]
struct LoopCounters {
    events_processed: AtomicU64,
    events_failed: AtomicU64,
    events_discarded: AtomicU64,
    callbacks_run: AtomicU64,
    callbacks_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoopStats {
    pub events_processed: u64,
    pub events_failed: u64,
    /// Events still queued when the loop thread exited.
    pub events_discarded: u64,
    pub callbacks_run: u64,
    pub callbacks_failed: u64,
}

struct Shared {
    events: TaskQueue<Control>,
    on_quit: Mutex<VecDeque<Task>>,
    running: AtomicBool,
    exit_code: AtomicI32,
    panic_handler: PanicHandler,
    counters: LoopCounters,
    thread_id: OnceLock<ThreadId>,
}

impl Shared {
    fn on_loop_thread(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }

    fn run(&self) {
        let _ = self.thread_id.set(thread::current().id());
        tracing::debug!("main loop started");

        let open = |control: &Control| {
            matches!(control.phase, LoopPhase::Running | LoopPhase::Draining)
        };
        while let Some(event) = self.events.next(open) {
            self.counters.events_processed.fetch_add(1, Ordering::Relaxed);
            if self.panic_handler.run_task(event, "main-loop").is_err() {
                self.counters.events_failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let discarded = self.events.len();
        self.counters
            .events_discarded
            .store(discarded as u64, Ordering::Relaxed);
        tracing::debug!(discarded, "main loop exited");
    }
}

pub struct MainLoop {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_name: String,
    stack_size: Option<usize>,
}

impl MainLoop {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                events: TaskQueue::new(Control {
                    phase: LoopPhase::Idle,
                    spawned: false,
                }),
                on_quit: Mutex::new(VecDeque::new()),
                running: AtomicBool::new(false),
                exit_code: AtomicI32::new(0),
                panic_handler: PanicHandler::new(config.panic_strategy),
                counters: LoopCounters::default(),
                thread_id: OnceLock::new(),
            }),
            thread: Mutex::new(None),
            thread_name: config.loop_thread_name.clone(),
            stack_size: config.stack_size,
        }
    }

    /// Set the running flag and spawn the loop thread. A loop runs once:
    /// starting it again fails with [`Error::AlreadyStarted`] or, after
    /// shutdown, [`Error::Terminated`].
    pub fn start(&self) -> Result<()> {
        // held across spawn so a concurrent wait() always finds the handle
        let mut thread_slot = self.thread.lock();

        let previous = self.shared.events.transition(|control| {
            let previous = control.phase;
            if previous == LoopPhase::Idle {
                control.phase = LoopPhase::Running;
                control.spawned = true;
                self.shared.running.store(true, Ordering::Release);
            }
            previous
        });

        match previous {
            LoopPhase::Idle => {}
            LoopPhase::Running | LoopPhase::Draining => return Err(Error::AlreadyStarted),
            LoopPhase::Stopped | LoopPhase::Joined => return Err(Error::Terminated),
        }

        let shared = Arc::clone(&self.shared);
        let mut builder = thread::Builder::new().name(self.thread_name.clone());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        match builder.spawn(move || shared.run()) {
            Ok(handle) => {
                *thread_slot = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.events.transition(|control| {
                    control.spawned = false;
                    if control.phase == LoopPhase::Running {
                        control.phase = LoopPhase::Idle;
                        self.shared.running.store(false, Ordering::Release);
                    }
                });
                Err(Error::Spawn(e))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> LoopPhase {
        self.shared.events.inspect(|slot| slot.state.phase)
    }

    /// Queue `event` for the loop thread.
    pub fn post_event<F>(&self, event: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_task(Task::new(event));
    }

    pub fn post_fallible_event<F, E>(&self, event: F)
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        self.post_task(Task::fallible(event));
    }

    pub fn post_task(&self, task: Task) {
        let id = task.id();
        if let Err(e) = self.shared.events.push(task) {
            tracing::error!(task = %id, error = %e, "dropping event, queue allocation failed");
        }
    }

    /// Register a cleanup callback for [`quit`](MainLoop::quit). Callable from
    /// anywhere, including from inside another on-quit callback.
    pub fn add_on_quit<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let task = Task::new(callback);
        let id = task.id();
        let mut on_quit = self.shared.on_quit.lock();
        match on_quit.try_reserve(1) {
            Ok(()) => on_quit.push_back(task),
            Err(e) => {
                tracing::error!(task = %id, error = %e, "dropping on-quit callback, queue allocation failed");
            }
        }
    }

    /// Record `code`, run on-quit callbacks on the calling thread until none
    /// are left (including ones registered meanwhile), then clear the running
    /// flag and wake the loop so it exits.
    pub fn quit(&self, code: i32) {
        self.shared.exit_code.store(code, Ordering::SeqCst);
        self.shared.events.transition(|control| {
            if control.phase == LoopPhase::Running {
                control.phase = LoopPhase::Draining;
            }
        });
        tracing::debug!(code, "quit requested");

        loop {
            // the queue lock is released before the callback runs
            let callback = self.shared.on_quit.lock().pop_front();
            let Some(callback) = callback else {
                break;
            };

            self.shared.counters.callbacks_run.fetch_add(1, Ordering::Relaxed);
            if self.shared.panic_handler.run_task(callback, "on-quit").is_err() {
                self.shared
                    .counters
                    .callbacks_failed
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        self.shared.events.transition(|control| {
            if matches!(
                control.phase,
                LoopPhase::Idle | LoopPhase::Running | LoopPhase::Draining
            ) {
                control.phase = LoopPhase::Stopped;
            }
            self.shared.running.store(false, Ordering::Release);
        });
    }

    /// Block until the loop thread has exited and return the exit code.
    ///
    /// Returns immediately on a loop that was never started, and when called
    /// from the loop thread itself.
    pub fn wait(&self) -> i32 {
        if self.shared.on_loop_thread() {
            tracing::warn!("wait called from the main loop thread, not joining");
            return self.exit_code();
        }

        let handle = self.thread.lock().take();
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    tracing::error!("main loop thread panicked");
                }
                self.shared
                    .events
                    .transition(|control| control.phase = LoopPhase::Joined);
                tracing::debug!(code = self.exit_code(), "main loop joined");
            }
            None => {
                let never_started = self.shared.events.transition(|control| {
                    if control.phase == LoopPhase::Stopped && !control.spawned {
                        control.phase = LoopPhase::Joined;
                    }
                    control.phase == LoopPhase::Idle
                });
                if never_started {
                    tracing::warn!("wait called on a main loop that was never started");
                    return self.exit_code();
                }
                // another caller holds the handle
                self.shared
                    .events
                    .wait_until(|control| control.phase == LoopPhase::Joined);
            }
        }

        self.exit_code()
    }

    pub fn exit_code(&self) -> i32 {
        self.shared.exit_code.load(Ordering::SeqCst)
    }

    pub fn pending_events(&self) -> usize {
        self.shared.events.len()
    }

    pub fn pending_on_quit(&self) -> usize {
        self.shared.on_quit.lock().len()
    }

    pub fn stats(&self) -> LoopStats {
        let counters = &self.shared.counters;
        LoopStats {
            events_processed: counters.events_processed.load(Ordering::Relaxed),
            events_failed: counters.events_failed.load(Ordering::Relaxed),
            events_discarded: counters.events_discarded.load(Ordering::Relaxed),
            callbacks_run: counters.callbacks_run.load(Ordering::Relaxed),
            callbacks_failed: counters.callbacks_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("phase", &self.phase())
            .field("pending_events", &self.pending_events())
            .field("pending_on_quit", &self.pending_on_quit())
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        match self.phase() {
            LoopPhase::Running | LoopPhase::Draining => {
                self.quit(0);
                self.wait();
            }
            LoopPhase::Stopped => {
                self.wait();
            }
            LoopPhase::Idle | LoopPhase::Joined => {}
        }
    }
}
