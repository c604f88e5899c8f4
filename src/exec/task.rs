use crate::context::{keys, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque unique task id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Shared cooperative-cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One dispatched unit of work.
///
/// The task owns its context snapshot exclusively; nothing else references
/// it, so the algorithm may mutate it without locking. Dropping the task
/// releases the snapshot.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    algorithm: String,
    curve_id: Option<String>,
    context: Context,
    created_at: DateTime<Utc>,
    cancel: CancelFlag,
}

impl Task {
    pub fn new(algorithm: impl Into<String>, context: Context) -> Self {
        let curve_id = context.get(keys::ACTIVE_CURVE_ID);
        Self {
            id: TaskId::new(),
            algorithm: algorithm.into(),
            curve_id,
            context,
            created_at: Utc::now(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Active curve id captured when the snapshot was taken
    pub fn curve_id(&self) -> Option<&str> {
        self.curve_id.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_captures_curve_id_and_owns_snapshot() {
        let mut ctx = Context::new(3);
        ctx.set_value(keys::ACTIVE_CURVE_ID, "C1", "test");
        let mut task = Task::new("smooth", ctx.clone());

        assert_eq!(task.curve_id(), Some("C1"));
        assert_eq!(task.algorithm(), "smooth");

        task.context_mut().set_value("scratch", &1, "worker");
        assert!(!ctx.contains("scratch"));
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let task = Task::new("smooth", Context::new(1));
        let flag = task.cancel_flag();
        assert!(!task.is_cancelled());
        flag.cancel();
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
