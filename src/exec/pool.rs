//! Bounded, lazily grown set of workers

use crate::core::errors::{EngineError, Result};
use crate::exec::worker::{Worker, WorkerId, WorkerJob};
use crate::exec::WorkerEvent;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Slot {
    worker: Worker,
    busy: bool,
}

/// Owns every worker. A worker is either idle or assigned to exactly one
/// task; `acquire_worker` and `release_worker` move it between the two.
#[derive(Debug)]
pub struct WorkerPool {
    slots: Vec<Slot>,
    max_workers: usize,
    events: mpsc::UnboundedSender<WorkerEvent>,
    shutting_down: bool,
}

impl WorkerPool {
    pub fn new(max_workers: usize, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self {
            slots: Vec::new(),
            max_workers: max_workers.max(1),
            events,
            shutting_down: false,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Only allowed before the first worker is created.
    pub fn set_max_workers(&mut self, max_workers: usize) -> Result<()> {
        if max_workers == 0 {
            return Err(EngineError::configuration_field(
                "max_workers must be at least 1",
                "max_workers",
            ));
        }
        if !self.slots.is_empty() {
            return Err(EngineError::configuration_field(
                format!(
                    "cannot change max_workers after {} worker(s) were created",
                    self.slots.len()
                ),
                "max_workers",
            ));
        }
        self.max_workers = max_workers;
        Ok(())
    }

    /// Reserve an idle worker, creating one while under the limit.
    ///
    /// Returns `None` when every worker is busy and the limit is reached, or
    /// once shutdown has begun.
    pub fn acquire_worker(&mut self) -> Option<WorkerId> {
        if self.shutting_down {
            return None;
        }
        if let Some(slot) = self.slots.iter_mut().find(|slot| !slot.busy) {
            slot.busy = true;
            return Some(slot.worker.id());
        }
        if self.slots.len() < self.max_workers {
            let id = WorkerId::new(self.slots.len());
            self.slots.push(Slot {
                worker: Worker::spawn(id, self.events.clone()),
                busy: true,
            });
            debug!(worker = %id, total = self.slots.len(), "Created worker");
            return Some(id);
        }
        None
    }

    /// Hand a job to a worker previously returned by `acquire_worker`.
    pub(crate) fn assign(&self, id: WorkerId, job: WorkerJob) -> std::result::Result<(), WorkerJob> {
        match self.slot(id) {
            Some(slot) if slot.busy => slot.worker.assign(job),
            _ => Err(job),
        }
    }

    /// Mark a worker idle again and announce it on the event channel.
    pub fn release_worker(&mut self, id: WorkerId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            warn!(worker = %id, "Release of unknown worker");
            return false;
        };
        if !slot.busy {
            warn!(worker = %id, "Release of idle worker");
            return false;
        }
        slot.busy = false;
        let _ = self.events.send(WorkerEvent::WorkerReleased { worker: id });
        true
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.slot(id).map(|slot| &slot.worker)
    }

    pub fn is_busy(&self, id: WorkerId) -> bool {
        self.slot(id).map(|slot| slot.busy).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.busy).count()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn request_cancellation_all(&self) {
        for slot in self.slots.iter().filter(|slot| slot.busy) {
            slot.worker.request_cancellation();
        }
    }

    pub(crate) fn emit(&self, event: WorkerEvent) {
        let _ = self.events.send(event);
    }

    /// Cancel running work, close every worker and wait up to `grace` for
    /// them to exit. Stragglers are aborted; returns how many were.
    ///
    /// Once this returns no worker loop is left to send events. An aborted
    /// worker never reports its task.
    pub async fn shutdown(&mut self, grace: Duration) -> usize {
        if self.shutting_down {
            return 0;
        }
        self.shutting_down = true;
        self.request_cancellation_all();

        let mut handles: Vec<_> = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.worker.stop())
            .collect();

        info!(workers = handles.len(), grace_ms = grace.as_millis() as u64, "Shutting down worker pool");
        if tokio::time::timeout(grace, join_all(handles.iter_mut())).await.is_ok() {
            debug!("All workers stopped");
            return 0;
        }

        let stragglers = handles.iter().filter(|h| !h.is_finished()).count();
        warn!(
            grace_ms = grace.as_millis() as u64,
            stragglers, "Workers did not stop in time, aborting"
        );
        for handle in &handles {
            handle.abort();
        }
        join_all(handles).await;
        stragglers
    }

    fn slot(&self, id: WorkerId) -> Option<&Slot> {
        self.slots.get(id.index())
    }
}
