//! Execution contexts for observer callbacks

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Fire-and-forget scheduling of a unit of work.
///
/// Implementations may run the work inline or defer it. Callers must not
/// assume the work has run when `spawn` returns.
pub trait Executor: Send + Sync {
    fn spawn(&self, work: Work);
}

/// Runs every job immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn spawn(&self, work: Work) {
        work();
    }
}

/// A FIFO work queue drained by a single blocking worker on a tokio runtime.
///
/// Jobs run off the caller's thread but in submission order, so an observer
/// sees `device_added` before the `changes_complete` that follows it.
pub struct WorkQueueExecutor {
    name: String,
    sender: mpsc::UnboundedSender<Work>,
}

impl WorkQueueExecutor {
    /// Start the worker on the given runtime. The worker exits once the
    /// executor is dropped and the queue is drained.
    pub fn new(name: impl Into<String>, runtime: &Handle) -> Self {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Work>();

        let worker_name = name.clone();
        runtime.spawn_blocking(move || {
            debug!("🧵 Work queue '{}' started", worker_name);
            while let Some(work) = receiver.blocking_recv() {
                work();
            }
            debug!("🧵 Work queue '{}' drained and stopped", worker_name);
        });

        Self { name, sender }
    }

    /// Use the runtime of the current tokio context
    pub fn on_current_runtime(name: impl Into<String>) -> Self {
        Self::new(name, &Handle::current())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Executor for WorkQueueExecutor {
    fn spawn(&self, work: Work) {
        if self.sender.send(work).is_err() {
            warn!("⚠️ Work queue '{}' is gone, dropping job", self.name);
        }
    }
}
