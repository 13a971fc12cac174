//! taskloop - worker threads, a least-loaded router and a main event loop
//!
//! Each [`Worker`] owns one thread and one FIFO queue of closures.
//! [`WorkerPool`] sends every new task to the worker with the shortest queue.
//! [`MainLoop`] runs posted events on its own thread and coordinates shutdown:
//! [`MainLoop::quit`] runs every registered on-quit callback in order, then
//! stops the loop; [`MainLoop::wait`] joins it and returns the exit code.
//!
//! # Quick Start
//!
//! ```no_run
//! use taskloop::prelude::*;
//!
//! let runtime = Runtime::new(Config::builder().num_workers(4).build().unwrap()).unwrap();
//! runtime.start().unwrap();
//!
//! for n in 0..100u64 {
//!     runtime.submit(move || {
//!         let _ = (0..n).sum::<u64>();
//!     });
//! }
//!
//! // stops every worker, then the loop
//! runtime.quit(0);
//! assert_eq!(runtime.wait(), 0);
//! ```
//!
//! Panics and `Err` results from tasks, events and callbacks are caught,
//! logged through `tracing`, and counted; they never stop the loop that ran
//! them.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod main_loop;
pub mod prelude;
pub mod runtime;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{PanicStrategy, Task, TaskId, Worker, WorkerPool, WorkerState, WorkerStatus};
pub use main_loop::{LoopPhase, LoopStats, MainLoop};
pub use runtime::{global, Runtime};

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_pool_over_started_workers() {
        let workers: Vec<Worker> = (0..3).map(|i| Worker::new(format!("w{}", i))).collect();
        for worker in &workers {
            worker.start().unwrap();
        }

        let hits = Arc::new(Mutex::new(0));
        let pool = WorkerPool::new(&workers);
        for _ in 0..30 {
            let hits = hits.clone();
            pool.add_task(move || *hits.lock() += 1);
        }

        while pool.total_queued() > 0 {
            std::thread::yield_now();
        }
        for worker in &workers {
            worker.stop();
        }

        assert_eq!(*hits.lock(), 30);
    }

    #[test]
    fn test_main_loop_stops_workers() {
        let main_loop = MainLoop::new();
        let workers: Arc<[Worker]> = (0..2).map(|i| Worker::new(format!("w{}", i))).collect();

        main_loop.start().unwrap();
        for index in 0..workers.len() {
            workers[index].start().unwrap();
            let workers = workers.clone();
            main_loop.add_on_quit(move || workers[index].stop());
        }

        main_loop.quit(0);
        assert!(workers.iter().all(Worker::is_finished));
        assert_eq!(main_loop.wait(), 0);
    }
}
