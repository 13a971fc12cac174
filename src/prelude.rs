pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{PanicStrategy, Task, Worker, WorkerPool, WorkerState, WorkerStatus};
pub use crate::main_loop::{LoopPhase, MainLoop};
pub use crate::runtime::Runtime;
pub use crate::global;
