use super::task::Task;
use crate::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What to do after a task panics or returns an error. Neither option stops the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PanicStrategy {
    /// Count the failure, log nothing.
    Isolate,
    LogAndContinue,
}

impl Default for PanicStrategy {
    fn default() -> Self {
        PanicStrategy::LogAndContinue
    }
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    failure_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            failure_count: AtomicUsize::new(0),
        }
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            PanicInfo::from_payload(payload)
        })
    }

    /// Run `task` with panics and returned errors contained. `context` names
    /// the executing loop in log records.
    pub(crate) fn run_task(&self, task: Task, context: &str) -> Result<(), Error> {
        let id = task.id();
        let error = match self.execute(|| task.run()) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(msg)) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                Error::TaskFailed(msg)
            }
            Err(info) => Error::TaskPanicked(info.message),
        };

        if self.strategy == PanicStrategy::LogAndContinue {
            tracing::warn!(task = %id, context, error = %error, "task did not complete");
        }

        Err(error)
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn reset_count(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_handler_isolate() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute(|| {
            panic!("test panic");
        });

        assert_eq!(result.unwrap_err().message, "test panic");
        assert_eq!(handler.failure_count(), 1);
    }

    #[test]
    fn test_panic_handler_success() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute(|| 42);

        assert_eq!(result.unwrap(), 42);
        assert_eq!(handler.failure_count(), 0);
    }

    #[test]
    fn test_formatted_panic_message() {
        let handler = PanicHandler::default();
        let n = 7;
        let err = handler.execute(|| panic!("bad value {}", n)).unwrap_err();
        assert_eq!(err.message, "bad value 7");
    }

    #[test]
    fn test_run_task_classifies_failures() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        assert!(handler.run_task(Task::new(|| {}), "test").is_ok());

        let panicked = handler.run_task(Task::new(|| panic!("boom")), "test");
        assert!(matches!(panicked, Err(Error::TaskPanicked(ref m)) if m == "boom"));

        let failed = handler.run_task(Task::fallible(|| Err::<(), _>("refused")), "test");
        assert!(matches!(failed, Err(Error::TaskFailed(ref m)) if m == "refused"));

        assert_eq!(handler.failure_count(), 2);
    }

    #[test]
    fn test_failure_counter() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        for _ in 0..5 {
            let _ = handler.execute(|| {
                panic!("test");
            });
        }

        assert_eq!(handler.failure_count(), 5);

        handler.reset_count();
        assert_eq!(handler.failure_count(), 0);
    }
}
