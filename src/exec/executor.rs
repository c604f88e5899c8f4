//! FIFO hand-off of tasks to pool workers

use crate::algorithm::registry::AlgorithmRegistry;
use crate::core::errors::{EngineError, Result};
use crate::exec::pool::WorkerPool;
use crate::exec::task::{CancelFlag, Task, TaskId};
use crate::exec::worker::{WorkerId, WorkerJob};
use crate::exec::{FailureReason, WorkerEvent};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Snapshot of pool and queue occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub busy: usize,
    pub running: usize,
    pub queued: usize,
    pub max_workers: usize,
}

/// What `cancel` found for a task id
#[derive(Debug)]
pub enum CancelOutcome {
    /// Cancellation was requested; the worker reports the outcome later
    Running,
    /// The task never started and was removed from the queue
    Queued(Task),
    NotFound,
}

#[derive(Debug)]
struct RunningTask {
    worker: WorkerId,
    algorithm: String,
    cancel: CancelFlag,
}

/// Queues submitted tasks and starts them as workers free up.
///
/// Submission never blocks: a task that finds no idle worker waits in the
/// queue and starts, in submission order, when a worker is released.
#[derive(Debug)]
pub struct TaskExecutor {
    pool: WorkerPool,
    registry: AlgorithmRegistry,
    queue: VecDeque<Task>,
    running: HashMap<TaskId, RunningTask>,
}

impl TaskExecutor {
    pub fn new(
        registry: AlgorithmRegistry,
        max_workers: usize,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            pool: WorkerPool::new(max_workers, events),
            registry,
            queue: VecDeque::new(),
            running: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn set_max_workers(&mut self, max_workers: usize) -> Result<()> {
        self.pool.set_max_workers(max_workers)
    }

    pub fn submit(&mut self, task: Task) -> Result<()> {
        if self.pool.is_shutting_down() {
            return Err(EngineError::PoolShutdown);
        }
        debug!(task_id = %task.id(), algorithm = %task.algorithm(), "Task queued");
        self.queue.push_back(task);
        self.try_start();
        Ok(())
    }

    /// Start queued tasks while idle workers can be acquired.
    fn try_start(&mut self) {
        while !self.queue.is_empty() {
            let Some(worker) = self.pool.acquire_worker() else {
                break;
            };
            let Some(task) = self.queue.pop_front() else {
                self.pool.release_worker(worker);
                break;
            };

            let task_id = task.id();
            let algorithm = self.registry.get(task.algorithm());
            self.running.insert(
                task_id,
                RunningTask {
                    worker,
                    algorithm: task.algorithm().to_string(),
                    cancel: task.cancel_flag(),
                },
            );

            if let Err(job) = self.pool.assign(worker, WorkerJob { task, algorithm }) {
                warn!(worker = %worker, task_id = %task_id, "Worker refused task");
                self.pool.emit(WorkerEvent::TaskFailed {
                    worker: Some(worker),
                    task_id,
                    algorithm: job.task.algorithm().to_string(),
                    reason: FailureReason::Dispatch(format!("{worker} is not accepting work")),
                });
            } else {
                debug!(worker = %worker, task_id = %task_id, "Task assigned");
            }
        }
    }

    /// Bookkeeping for a task that reached a terminal event. Releases its
    /// worker; returns `false` for ids that were not running.
    pub fn on_task_settled(&mut self, task_id: TaskId) -> bool {
        match self.running.remove(&task_id) {
            Some(running) => {
                self.pool.release_worker(running.worker);
                true
            }
            None => false,
        }
    }

    /// A worker went idle; start whatever is waiting.
    pub fn on_worker_released(&mut self, worker: WorkerId) {
        debug!(worker = %worker, queued = self.queue.len(), "Worker available");
        self.try_start();
    }

    pub fn cancel(&mut self, task_id: TaskId) -> CancelOutcome {
        if let Some(running) = self.running.get(&task_id) {
            info!(task_id = %task_id, worker = %running.worker, algorithm = %running.algorithm, "Cancelling running task");
            running.cancel.cancel();
            return CancelOutcome::Running;
        }
        if let Some(pos) = self.queue.iter().position(|task| task.id() == task_id) {
            if let Some(task) = self.queue.remove(pos) {
                info!(task_id = %task_id, "Removed queued task");
                return CancelOutcome::Queued(task);
            }
        }
        CancelOutcome::NotFound
    }

    /// Request cancellation of every running task and drain the queue.
    /// Returns the drained tasks.
    pub fn cancel_all(&mut self) -> Vec<Task> {
        for running in self.running.values() {
            running.cancel.cancel();
        }
        self.pool.request_cancellation_all();
        self.queue.drain(..).collect()
    }

    pub fn is_running(&self, task_id: TaskId) -> bool {
        self.running.contains_key(&task_id)
    }

    pub fn is_queued(&self, task_id: TaskId) -> bool {
        self.queue.iter().any(|task| task.id() == task_id)
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queue.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.pool.len(),
            busy: self.pool.busy_count(),
            running: self.running.len(),
            queued: self.queue.len(),
            max_workers: self.pool.max_workers(),
        }
    }

    /// Stop accepting work, cancel everything and wait for workers to exit.
    /// Returns the tasks that were still queued.
    pub async fn shutdown(&mut self, grace: Duration) -> Vec<Task> {
        // Task flags survive a job that has not been picked up yet.
        let drained = self.cancel_all();
        let aborted = self.pool.shutdown(grace).await;
        if aborted > 0 {
            warn!(aborted, "Workers aborted with tasks still running");
        }
        drained
    }

    /// Forget every task still marked running and free its worker.
    ///
    /// Only meaningful after `shutdown`, once every terminal event already
    /// sent has been settled: whatever is left belonged to an aborted worker
    /// and will never report. Returns `(task id, algorithm)` pairs.
    pub fn abandon_running(&mut self) -> Vec<(TaskId, String)> {
        let mut abandoned: Vec<(TaskId, String)> = Vec::with_capacity(self.running.len());
        for (task_id, running) in self.running.drain() {
            self.pool.release_worker(running.worker);
            abandoned.push((task_id, running.algorithm));
        }
        abandoned
    }
}
