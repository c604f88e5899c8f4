use crate::exec::task::{CancelFlag, TaskId};
use crate::exec::worker::WorkerId;
use crate::exec::WorkerEvent;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

/// Progress and cancellation capability handed to a running algorithm.
///
/// Reports are delivered in order; no cadence beyond that is promised.
pub trait ProgressReporter: Send + Sync {
    /// `percent` is clamped to 0..=100
    fn report_progress(&self, percent: u32, message: &str);

    /// Poll this regularly and stop when it returns `true`
    fn should_cancel(&self) -> bool;
}

/// Reporter that drops progress and never cancels. Handy for running an
/// algorithm outside the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report_progress(&self, _percent: u32, _message: &str) {}

    fn should_cancel(&self) -> bool {
        false
    }
}

/// Worker-side reporter bound to a single task.
///
/// Lives exactly as long as the algorithm call; dropping it is the
/// unregistration.
pub(crate) struct TaskReporter {
    worker: WorkerId,
    task_id: TaskId,
    task_cancel: CancelFlag,
    worker_cancel: CancelFlag,
    events: mpsc::UnboundedSender<WorkerEvent>,
    last_percent: AtomicU32,
}

impl TaskReporter {
    pub(crate) fn new(
        worker: WorkerId,
        task_id: TaskId,
        task_cancel: CancelFlag,
        worker_cancel: CancelFlag,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            worker,
            task_id,
            task_cancel,
            worker_cancel,
            events,
            last_percent: AtomicU32::new(0),
        }
    }
}

impl ProgressReporter for TaskReporter {
    fn report_progress(&self, percent: u32, message: &str) {
        // Percentages never go backwards for a task.
        let percent = percent.min(100);
        let percent = self.last_percent.fetch_max(percent, Ordering::SeqCst).max(percent);
        trace!(worker = %self.worker, task_id = %self.task_id, percent, "Progress");
        let _ = self.events.send(WorkerEvent::TaskProgress {
            worker: self.worker,
            task_id: self.task_id,
            percent,
            message: message.to_string(),
        });
    }

    fn should_cancel(&self) -> bool {
        self.task_cancel.is_cancelled() || self.worker_cancel.is_cancelled()
    }
}
