//! Engine - the explicitly constructed owner of every engine component
//!
//! The engine lives on the caller's (UI) task. It owns the blackboard, runs
//! the interaction coordinator, stages the context and dispatches tasks, and
//! turns worker events into observer notifications. Worker events are only
//! processed when the caller drives the engine (`process_pending_events`,
//! `process_next_event` or `run_until_idle`), so the blackboard is never
//! touched from a worker.

use crate::algorithm::registry::AlgorithmRegistry;
use crate::algorithm::result::{ResultDispatcher, ResultHandler, ResultKind};
use crate::algorithm::unit::Algorithm;
use crate::context::{keys, Context};
use crate::core::config::EngineConfig;
use crate::core::errors::{EngineError, Result};
use crate::coord::coordinator::InteractionCoordinator;
use crate::coord::hooks::{CompositeObserver, EngineObserver};
use crate::coord::types::{ExecutionRequest, InteractionCommand, PendingRequest};
use crate::curve::{CurveProvider, InMemoryCurves, Point};
use crate::exec::executor::{CancelOutcome, PoolStats, TaskExecutor};
use crate::exec::task::{Task, TaskId};
use crate::exec::{FailureReason, WorkerEvent};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const ENGINE_SOURCE: &str = "engine";

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    registry: AlgorithmRegistry,
    curves: Option<Arc<dyn CurveProvider>>,
    observer: CompositeObserver,
    results: ResultDispatcher,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: AlgorithmRegistry::new(),
            curves: None,
            observer: CompositeObserver::new(),
            results: ResultDispatcher::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: AlgorithmRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register an algorithm unit
    pub fn register(self, unit: Arc<dyn Algorithm>) -> Result<Self> {
        self.registry.register(unit)?;
        Ok(self)
    }

    pub fn with_curves(mut self, curves: Arc<dyn CurveProvider>) -> Self {
        self.curves = Some(curves);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer.add_observer(observer);
        self
    }

    /// Route finished results of `kind` to `handler`
    pub fn with_result_handler(mut self, kind: ResultKind, handler: Arc<dyn ResultHandler>) -> Self {
        self.results.register(kind, handler);
        self
    }

    /// Validate the configuration and assemble the engine.
    ///
    /// Must be called from within a tokio runtime; workers are spawned on it
    /// lazily.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let curves = self
            .curves
            .unwrap_or_else(|| Arc::new(InMemoryCurves::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            max_workers = self.config.max_workers,
            history_depth = self.config.history_depth,
            algorithms = self.registry.list().len(),
            "Engine created"
        );

        Ok(Engine {
            context: Context::with_event_capacity(
                self.config.history_depth,
                self.config.context_event_capacity,
            ),
            coordinator: InteractionCoordinator::new(self.registry.clone(), curves.clone()),
            executor: TaskExecutor::new(self.registry.clone(), self.config.max_workers, events_tx),
            registry: self.registry,
            curves,
            events: events_rx,
            observer: self.observer,
            results: self.results,
            config: self.config,
        })
    }
}

pub struct Engine {
    config: EngineConfig,
    context: Context,
    registry: AlgorithmRegistry,
    curves: Arc<dyn CurveProvider>,
    coordinator: InteractionCoordinator,
    executor: TaskExecutor,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    observer: CompositeObserver,
    results: ResultDispatcher,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Direct blackboard access, e.g. to publish prerequisite keys
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.coordinator.pending()
    }

    /// Trigger `name` with no preset parameters.
    ///
    /// Returns the task id when the algorithm was dispatched right away.
    pub fn trigger(&mut self, name: &str) -> Option<TaskId> {
        self.trigger_with(name, Map::new())
    }

    pub fn trigger_with(&mut self, name: &str, preset: Map<String, Value>) -> Option<TaskId> {
        debug!(algorithm = %name, preset = preset.len(), "Trigger");
        let commands = self.coordinator.handle_trigger(name, preset, &self.context);
        self.apply(commands)
    }

    pub fn submit_parameters(&mut self, name: &str, parameters: Map<String, Value>) -> Option<TaskId> {
        let commands = self.coordinator.handle_parameter_submission(name, parameters);
        self.apply(commands)
    }

    pub fn submit_points(&mut self, points: Vec<Point>) -> Option<TaskId> {
        let commands = self.coordinator.handle_point_selection(points);
        self.apply(commands)
    }

    pub fn cancel_pending(&mut self) {
        let commands = self.coordinator.cancel_pending();
        self.apply(commands);
    }

    /// Dispatch `name` again on the active curve with the parameters and
    /// points of its previous run, skipping all interaction.
    pub fn rerun_last(&mut self, name: &str) -> Option<TaskId> {
        let Some(last) = self.context.last_run(name) else {
            self.observer
                .algorithm_failed(name, &format!("{name} has not been run yet"));
            return None;
        };
        let Some(curve) = self.curves.active_curve() else {
            self.observer.algorithm_failed(name, "no curve is selected");
            return None;
        };
        self.apply(vec![InteractionCommand::Execute(ExecutionRequest {
            algorithm: name.to_string(),
            curve_id: curve.id,
            parameters: last.parameters,
            points: last.points,
        })])
    }

    /// Cancel a running task cooperatively or drop a queued one.
    ///
    /// Returns `false` for unknown or already settled ids.
    pub fn cancel_task(&mut self, task_id: TaskId) -> bool {
        match self.executor.cancel(task_id) {
            CancelOutcome::Running => true,
            CancelOutcome::Queued(task) => {
                self.report_dropped(task);
                true
            }
            CancelOutcome::NotFound => false,
        }
    }

    /// Cancel every running and queued task, and any pending request.
    pub fn cancel_all(&mut self) {
        self.cancel_pending();
        for task in self.executor.cancel_all() {
            self.report_dropped(task);
        }
    }

    /// Only allowed before the first task has run.
    pub fn set_max_workers(&mut self, max_workers: usize) -> Result<()> {
        self.executor.set_max_workers(max_workers)?;
        self.config.max_workers = max_workers;
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        self.executor.stats()
    }

    /// No task running or queued
    pub fn is_idle(&self) -> bool {
        self.executor.is_idle()
    }

    /// Handle every worker event that is already available. Never waits.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_worker_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next worker event and handle it. Returns `false` when
    /// no more events can arrive.
    pub async fn process_next_event(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.handle_worker_event(event);
                true
            }
            None => false,
        }
    }

    /// Drive the engine until nothing is running or queued.
    pub async fn run_until_idle(&mut self) {
        while !self.executor.is_idle() {
            if !self.process_next_event().await {
                break;
            }
        }
        self.process_pending_events();
    }

    /// Cancel all work, stop the pool and flush the final events.
    pub async fn shutdown(&mut self) {
        info!("Engine shutting down");
        self.cancel_pending();
        let drained = self.executor.shutdown(self.config.shutdown_grace()).await;
        for task in drained {
            self.report_dropped(task);
        }
        // Settle what the workers sent before they stopped; anything still
        // running after that was aborted mid-task.
        self.process_pending_events();
        for (task_id, algorithm) in self.executor.abandon_running() {
            warn!(task_id = %task_id, algorithm = %algorithm, "Task ignored cancellation and was abandoned");
            self.report_cancelled(task_id, &algorithm);
        }
        self.process_pending_events();
    }

    /// Apply coordinator commands in order. Returns the id of the task
    /// dispatched by an `Execute` command, if any.
    fn apply(&mut self, commands: Vec<InteractionCommand>) -> Option<TaskId> {
        let mut dispatched = None;
        for command in commands {
            match command {
                InteractionCommand::Execute(request) => {
                    let algorithm = request.algorithm.clone();
                    match self.execute_algorithm(request) {
                        Ok(task_id) => dispatched = Some(task_id),
                        Err(e) => {
                            if e.is_validation() {
                                info!(algorithm = %algorithm, error = %e, "Dispatch rejected");
                            } else {
                                warn!(algorithm = %algorithm, category = e.category(), error = %e, "Dispatch failed");
                            }
                            self.observer.algorithm_failed(&algorithm, &e.to_string());
                        }
                    }
                }
                InteractionCommand::RequestParameters(request) => {
                    self.observer.request_parameter_dialog(&request)
                }
                InteractionCommand::RequestPoints(request) => {
                    self.observer.request_point_selection(&request)
                }
                InteractionCommand::Fail { algorithm, reason } => {
                    self.observer.algorithm_failed(&algorithm, &reason)
                }
                InteractionCommand::Notify(text) => self.observer.show_message(&text),
            }
        }
        dispatched
    }

    /// Stage the blackboard for `request` and hand it to the registry.
    fn execute_algorithm(&mut self, request: ExecutionRequest) -> Result<TaskId> {
        let ExecutionRequest {
            algorithm,
            curve_id,
            parameters,
            points,
        } = request;

        if !self.registry.contains(&algorithm) {
            return Err(EngineError::unknown_algorithm(&algorithm));
        }
        let curve = self.curves.curve(&curve_id).ok_or_else(|| {
            EngineError::validation_field(format!("curve '{curve_id}' no longer exists"), "curve")
        })?;

        self.context.remove_prefix(keys::CURVE_NS);
        self.context.remove_prefix(keys::PARAM_NS);
        self.context.remove_prefix(keys::POINTS_NS);

        self.context.set_value(keys::ACTIVE_CURVE, &curve, ENGINE_SOURCE);
        self.context
            .set_value(keys::ACTIVE_CURVE_ID, curve_id.as_str(), ENGINE_SOURCE);
        for (key, value) in &parameters {
            self.context.set_raw(&keys::param(key), value.clone(), &algorithm);
        }
        if !points.is_empty() {
            self.context
                .set_value(keys::SELECTED_POINTS, &points, ENGINE_SOURCE);
        }

        self.context
            .set_value(&keys::last_run_params(&algorithm), &parameters, ENGINE_SOURCE);
        self.context
            .set_value(&keys::last_run_points(&algorithm), &points, ENGINE_SOURCE);
        self.context
            .set_value(&keys::last_run_curve(&algorithm), curve_id.as_str(), ENGINE_SOURCE);

        self.registry
            .dispatch(&algorithm, &self.context, &mut self.executor)
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        if let Some(task_id) = event.task_id() {
            if !self.executor.is_running(task_id) {
                debug!(task_id = %task_id, "Ignoring event for a task that is no longer tracked");
                return;
            }
        }
        match event {
            WorkerEvent::TaskStarted {
                task_id, algorithm, ..
            } => self.observer.task_started(task_id, &algorithm),
            WorkerEvent::TaskProgress {
                task_id,
                percent,
                message,
                ..
            } => self.observer.task_progress(task_id, percent, &message),
            WorkerEvent::TaskFinished {
                task_id,
                algorithm,
                result,
                elapsed_ms,
                ..
            } => {
                self.executor.on_task_settled(task_id);
                let curve_id = result.parent_curve_id.clone();
                if !self
                    .context
                    .save_result(&task_id.to_string(), &algorithm, &curve_id, &result)
                {
                    warn!(task_id = %task_id, algorithm = %algorithm, "Result was not stored");
                }
                self.observer.task_finished(task_id, &result, elapsed_ms);
                let handled = self.results.dispatch(&result);
                debug!(task_id = %task_id, handlers = handled, kind = ?result.kind(), "Result routed");
                self.observer
                    .algorithm_completed(task_id, &algorithm, &curve_id, &result);
                self.observer.algorithm_succeeded(&algorithm);
            }
            WorkerEvent::TaskFailed {
                task_id,
                algorithm,
                reason,
                ..
            } => {
                self.executor.on_task_settled(task_id);
                self.observer.task_failed(task_id, &reason);
                self.observer.algorithm_failed(&algorithm, &reason.to_string());
            }
            WorkerEvent::WorkerReleased { worker } => self.executor.on_worker_released(worker),
        }
    }

    /// A queued task that will never start
    fn report_dropped(&self, task: Task) {
        info!(task_id = %task.id(), algorithm = %task.algorithm(), "Queued task dropped");
        self.report_cancelled(task.id(), task.algorithm());
    }

    fn report_cancelled(&self, task_id: TaskId, algorithm: &str) {
        let reason = FailureReason::Cancelled;
        self.observer.task_failed(task_id, &reason);
        self.observer.algorithm_failed(algorithm, &reason.to_string());
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("coordinator", &self.coordinator)
            .field("stats", &self.executor.stats())
            .finish()
    }
}
