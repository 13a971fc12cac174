use crate::config::Config;
use crate::error::Result;
use crate::executor::{Task, Worker, WorkerPool, WorkerStatus};
use crate::main_loop::MainLoop;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A main loop plus a fixed set of workers that it stops on quit.
///
/// Workers are named `"<prefix> #<index>"`. [`start`](Runtime::start)
/// registers one on-quit callback per worker, so `quit` stops them in index
/// order before the loop's running flag clears.
pub struct Runtime {
    // dropped first: quitting the loop stops the workers
    main_loop: MainLoop,
    workers: Arc<[Worker]>,
    config: Config,
}

impl Runtime {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let workers: Arc<[Worker]> = (0..config.worker_count())
            .map(|index| {
                Worker::with_config(
                    format!("{} #{}", config.worker_name_prefix, index),
                    &config,
                )
            })
            .collect();

        Ok(Self {
            main_loop: MainLoop::with_config(&config),
            workers,
            config,
        })
    }

    pub fn start(&self) -> Result<()> {
        self.main_loop.start()?;

        for (index, worker) in self.workers.iter().enumerate() {
            worker.start()?;
            let workers = Arc::clone(&self.workers);
            self.main_loop.add_on_quit(move || workers[index].stop());
        }

        tracing::info!(workers = self.workers.len(), "runtime started");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn main_loop(&self) -> &MainLoop {
        &self.main_loop
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn pool(&self) -> WorkerPool<'_> {
        WorkerPool::new(&self.workers)
    }

    /// Route a task to the least loaded worker.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool().push_task(Task::new(f));
    }

    pub fn post_event<F>(&self, event: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.main_loop.post_event(event);
    }

    pub fn add_on_quit<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.main_loop.add_on_quit(callback);
    }

    pub fn is_running(&self) -> bool {
        self.main_loop.is_running()
    }

    pub fn quit(&self, code: i32) {
        self.main_loop.quit(code);
    }

    pub fn wait(&self) -> i32 {
        self.main_loop.wait()
    }

    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.workers.iter().map(Worker::status).collect()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("main_loop", &self.main_loop)
            .field("workers", &self.workers)
            .finish()
    }
}

// Process-wide loop for code that cannot have one passed in
static GLOBAL_LOOP: OnceLock<MainLoop> = OnceLock::new();

/// The process-wide main loop, created (idle) on first use.
pub fn global() -> &'static MainLoop {
    GLOBAL_LOOP.get_or_init(MainLoop::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::WorkerState;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn small_config(n: usize) -> Config {
        Config::builder().num_workers(n).build().unwrap()
    }

    #[test]
    fn test_workers_are_named() {
        let rt = Runtime::new(small_config(3)).unwrap();
        let names: Vec<_> = rt.workers().iter().map(Worker::worker_name).collect();
        assert_eq!(names, vec!["Worker #0", "Worker #1", "Worker #2"]);
        assert_eq!(rt.pool().len(), 3);
    }

    #[test]
    fn test_quit_stops_workers_before_wait_returns() {
        let rt = Runtime::new(small_config(2)).unwrap();
        rt.start().unwrap();
        assert!(rt.workers().iter().all(Worker::is_running));

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            rt.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        while rt.pool().total_queued() > 0 {
            std::thread::yield_now();
        }

        rt.quit(2);
        assert!(rt.workers().iter().all(Worker::is_finished));
        assert_eq!(rt.wait(), 2);

        let executed: u64 = rt.statuses().iter().map(|s| s.executed).sum();
        assert_eq!(executed as usize, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn test_user_callbacks_run_after_worker_stops() {
        let rt = Runtime::new(small_config(1)).unwrap();
        rt.start().unwrap();

        let seen = Arc::new(Mutex::new(None));
        {
            let seen = seen.clone();
            let workers = Arc::clone(&rt.workers);
            rt.add_on_quit(move || *seen.lock() = Some(workers[0].state()));
        }

        rt.quit(0);
        rt.wait();
        assert_eq!(*seen.lock(), Some(WorkerState::Finished));
    }

    #[test]
    fn test_drop_without_quit() {
        let rt = Runtime::new(small_config(2)).unwrap();
        rt.start().unwrap();
        rt.post_event(|| {});
        drop(rt);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(global(), global()));
    }
}
