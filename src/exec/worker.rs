//! Worker - runs one task at a time on its own execution context
//!
//! Each worker is a long-lived tokio task fed through a channel. The
//! algorithm itself runs on the blocking pool so CPU-bound work never stalls
//! the runtime. Every outcome, including panics, ends in exactly one
//! `TaskFinished` or `TaskFailed` event.

use crate::algorithm::unit::Algorithm;
use crate::core::errors::Cancelled;
use crate::exec::reporter::TaskReporter;
use crate::exec::task::{CancelFlag, Task, TaskId};
use crate::exec::{FailureReason, WorkerEvent};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(usize);

impl WorkerId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// A task plus the unit that should run it. The unit is `None` when it
/// disappeared from the registry before the task reached a worker.
pub struct WorkerJob {
    pub task: Task,
    pub algorithm: Option<Arc<dyn Algorithm>>,
}

#[derive(Default)]
struct WorkerShared {
    current: Mutex<Option<(TaskId, CancelFlag)>>,
    cancel: CancelFlag,
}

impl WorkerShared {
    fn begin(&self, task_id: TaskId, flag: CancelFlag) {
        self.cancel.reset();
        *self.current.lock() = Some((task_id, flag));
    }

    fn finish(&self) {
        *self.current.lock() = None;
    }
}

pub struct Worker {
    id: WorkerId,
    jobs: Option<mpsc::UnboundedSender<WorkerJob>>,
    handle: Option<JoinHandle<()>>,
    shared: Arc<WorkerShared>,
}

impl Worker {
    /// Start the worker loop. Must be called from within a tokio runtime.
    pub(crate) fn spawn(id: WorkerId, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(WorkerShared::default());
        let handle = tokio::spawn(run_worker(id, jobs_rx, shared.clone(), events));
        info!(worker = %id, "Worker started");
        Self {
            id,
            jobs: Some(jobs_tx),
            handle: Some(handle),
            shared,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Hand a job to the worker. Returns the job back if the worker stopped.
    pub(crate) fn assign(&self, job: WorkerJob) -> Result<(), WorkerJob> {
        match &self.jobs {
            Some(jobs) => jobs.send(job).map_err(|e| e.0),
            None => Err(job),
        }
    }

    /// Ask the running task to stop. Advisory only: the algorithm has to poll.
    pub fn request_cancellation(&self) {
        self.shared.cancel.cancel();
        if let Some((task_id, flag)) = self.shared.current.lock().as_ref() {
            debug!(worker = %self.id, task_id = %task_id, "Cancellation requested");
            flag.cancel();
        }
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.shared.current.lock().as_ref().map(|(id, _)| *id)
    }

    /// Close the job channel; the loop exits once in-flight work is done.
    pub(crate) fn stop(&mut self) -> Option<JoinHandle<()>> {
        self.jobs.take();
        self.handle.take()
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("current_task", &self.current_task())
            .field("running", &self.jobs.is_some())
            .finish()
    }
}

async fn run_worker(
    id: WorkerId,
    mut jobs: mpsc::UnboundedReceiver<WorkerJob>,
    shared: Arc<WorkerShared>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    while let Some(job) = jobs.recv().await {
        let event = execute_task(id, job, &shared, &events).await;
        if events.send(event).is_err() {
            warn!(worker = %id, "Event receiver dropped, stopping worker");
            break;
        }
    }
    info!(worker = %id, "Worker stopped");
}

/// Run one job and produce its terminal event.
///
/// Cleanup (reporter drop, current-task clear, task drop) happens before the
/// event is returned.
async fn execute_task(
    worker: WorkerId,
    job: WorkerJob,
    shared: &Arc<WorkerShared>,
    events: &mpsc::UnboundedSender<WorkerEvent>,
) -> WorkerEvent {
    let WorkerJob { mut task, algorithm } = job;
    let task_id = task.id();
    let algorithm_name = task.algorithm().to_string();

    let Some(algorithm) = algorithm else {
        warn!(worker = %worker, task_id = %task_id, algorithm = %algorithm_name, "No algorithm unit for task");
        drop(task);
        return WorkerEvent::TaskFailed {
            worker: Some(worker),
            task_id,
            algorithm: algorithm_name.clone(),
            reason: FailureReason::Dispatch(format!("algorithm '{algorithm_name}' is not available")),
        };
    };

    let curve_id = task.curve_id().map(str::to_string);
    let task_cancel = task.cancel_flag();
    shared.begin(task_id, task_cancel.clone());

    let _ = events.send(WorkerEvent::TaskStarted {
        worker,
        task_id,
        algorithm: algorithm_name.clone(),
    });
    debug!(worker = %worker, task_id = %task_id, algorithm = %algorithm_name, "Task started");

    let reporter = TaskReporter::new(
        worker,
        task_id,
        task_cancel.clone(),
        shared.cancel.clone(),
        events.clone(),
    );
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = algorithm.execute_with_context(task.context_mut(), &reporter);
        drop(reporter);
        drop(task);
        result
    })
    .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let cancelled = task_cancel.is_cancelled() || shared.cancel.is_cancelled();
    shared.finish();

    let failed = |reason: FailureReason| WorkerEvent::TaskFailed {
        worker: Some(worker),
        task_id,
        algorithm: algorithm_name.clone(),
        reason,
    };

    match outcome {
        _ if cancelled => {
            info!(worker = %worker, task_id = %task_id, elapsed_ms, "Task cancelled");
            failed(FailureReason::Cancelled)
        }
        Ok(Ok(mut result)) => {
            result.stamp(&algorithm_name, curve_id.as_deref());
            info!(worker = %worker, task_id = %task_id, elapsed_ms, "Task finished");
            WorkerEvent::TaskFinished {
                worker,
                task_id,
                algorithm: algorithm_name.clone(),
                result,
                elapsed_ms,
            }
        }
        Ok(Err(e)) if e.downcast_ref::<Cancelled>().is_some() => failed(FailureReason::Cancelled),
        Ok(Err(e)) => {
            warn!(worker = %worker, task_id = %task_id, error = %e, "Task failed");
            failed(FailureReason::Error(format!("{e:#}")))
        }
        Err(join_error) if join_error.is_panic() => {
            let message = panic_message(join_error.into_panic());
            error!(worker = %worker, task_id = %task_id, panic = %message, "Algorithm panicked");
            failed(FailureReason::Panic(message))
        }
        Err(join_error) => failed(FailureReason::Error(join_error.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
