use super::task::Task;
use super::worker::Worker;
use std::fmt;

/// Routes each task to whichever borrowed worker has the shortest queue.
///
/// Selection is a snapshot scan: concurrent callers can pick the same worker.
/// Ties go to the worker that comes first in the slice.
#[derive(Clone, Copy, Default)]
pub struct WorkerPool<'a> {
    workers: &'a [Worker],
}

impl<'a> WorkerPool<'a> {
    pub fn new(workers: &'a [Worker]) -> Self {
        Self { workers }
    }

    pub fn add_task<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push_task(Task::new(f));
    }

    /// No-op when the pool has no workers.
    pub fn push_task(&self, task: Task) {
        if let Some(worker) = self.least_loaded() {
            worker.push_task(task);
        }
    }

    pub fn least_loaded(&self) -> Option<&'a Worker> {
        // min_by_key returns the first of equal minimums
        self.workers.iter().min_by_key(|worker| worker.tasks_count())
    }

    pub fn total_queued(&self) -> usize {
        self.workers.iter().map(Worker::tasks_count).sum()
    }

    pub fn workers(&self) -> &'a [Worker] {
        self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl fmt::Debug for WorkerPool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
