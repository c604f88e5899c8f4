//! Task execution: tasks, workers, the pool and the executor queue

pub mod executor;
pub mod pool;
pub mod reporter;
pub mod task;
pub mod worker;

use crate::algorithm::result::AlgorithmResult;
use serde::Serialize;
use std::fmt;

pub use executor::{CancelOutcome, PoolStats, TaskExecutor};
pub use pool::WorkerPool;
pub use reporter::{NoopReporter, ProgressReporter};
pub use task::{CancelFlag, Task, TaskId};
pub use worker::{Worker, WorkerId};

/// Why a task ended without a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// Stopped after a cancellation request
    Cancelled,
    /// Never ran: no unit was available for the task
    Dispatch(String),
    /// The algorithm returned an error
    Error(String),
    /// The algorithm panicked
    Panic(String),
}

impl FailureReason {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Dispatch(msg) => write!(f, "dispatch failed: {msg}"),
            Self::Error(msg) => f.write_str(msg),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Events flowing from workers and the pool back to the engine.
///
/// All of them travel over one ordered channel, so for any task
/// `TaskStarted` precedes its progress which precedes its terminal event.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    TaskStarted {
        worker: WorkerId,
        task_id: TaskId,
        algorithm: String,
    },
    TaskProgress {
        worker: WorkerId,
        task_id: TaskId,
        percent: u32,
        message: String,
    },
    TaskFinished {
        worker: WorkerId,
        task_id: TaskId,
        algorithm: String,
        result: AlgorithmResult,
        elapsed_ms: u64,
    },
    TaskFailed {
        /// `None` when the task never reached a worker
        worker: Option<WorkerId>,
        task_id: TaskId,
        algorithm: String,
        reason: FailureReason,
    },
    /// A worker went back to idle and can take queued work
    WorkerReleased { worker: WorkerId },
}

impl WorkerEvent {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::TaskProgress { task_id, .. }
            | Self::TaskFinished { task_id, .. }
            | Self::TaskFailed { task_id, .. } => Some(*task_id),
            Self::WorkerReleased { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TaskFinished { .. } | Self::TaskFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
        assert_eq!(
            FailureReason::Panic("index out of bounds".into()).to_string(),
            "panicked: index out of bounds"
        );
        assert_eq!(FailureReason::Error("no peaks".into()).to_string(), "no peaks");
        assert!(FailureReason::Cancelled.is_cancelled());
        assert!(!FailureReason::Dispatch("x".into()).is_cancelled());
    }
}
