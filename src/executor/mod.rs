//! Task execution infrastructure.
//!
//! Workers each own one thread and one FIFO queue; [`WorkerPool`] routes
//! tasks to the least loaded of a set of workers.

pub mod panic_handler;
pub mod pool;
pub(crate) mod queue;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use pool::WorkerPool;
pub use task::{Task, TaskId};
pub use worker::{Worker, WorkerState, WorkerStatus};
