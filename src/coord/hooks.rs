//! Observer hooks for engine notifications
//!
//! The UI, curve manager and undo stack all plug in here. Every method has a
//! no-op default so an observer only implements what it cares about.

use crate::algorithm::result::AlgorithmResult;
use crate::coord::types::{ParameterRequest, PointRequest};
use crate::exec::task::TaskId;
use crate::exec::FailureReason;
use parking_lot::Mutex;
use std::sync::Arc;

pub trait EngineObserver: Send + Sync {
    fn algorithm_failed(&self, _algorithm: &str, _reason: &str) {}

    fn algorithm_succeeded(&self, _algorithm: &str) {}

    /// A finished result, after it was saved into the context history
    fn algorithm_completed(
        &self,
        _task_id: TaskId,
        _algorithm: &str,
        _curve_id: &str,
        _result: &AlgorithmResult,
    ) {
    }

    fn task_started(&self, _task_id: TaskId, _algorithm: &str) {}

    fn task_progress(&self, _task_id: TaskId, _percent: u32, _message: &str) {}

    fn task_finished(&self, _task_id: TaskId, _result: &AlgorithmResult, _elapsed_ms: u64) {}

    fn task_failed(&self, _task_id: TaskId, _reason: &FailureReason) {}

    fn request_parameter_dialog(&self, _request: &ParameterRequest) {}

    fn request_point_selection(&self, _request: &PointRequest) {}

    fn show_message(&self, _text: &str) {}
}

/// Fans every notification out to a list of observers, in order
#[derive(Default, Clone)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn EngineObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn EngineObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl EngineObserver for CompositeObserver {
    fn algorithm_failed(&self, algorithm: &str, reason: &str) {
        for o in &self.observers {
            o.algorithm_failed(algorithm, reason);
        }
    }

    fn algorithm_succeeded(&self, algorithm: &str) {
        for o in &self.observers {
            o.algorithm_succeeded(algorithm);
        }
    }

    fn algorithm_completed(
        &self,
        task_id: TaskId,
        algorithm: &str,
        curve_id: &str,
        result: &AlgorithmResult,
    ) {
        for o in &self.observers {
            o.algorithm_completed(task_id, algorithm, curve_id, result);
        }
    }

    fn task_started(&self, task_id: TaskId, algorithm: &str) {
        for o in &self.observers {
            o.task_started(task_id, algorithm);
        }
    }

    fn task_progress(&self, task_id: TaskId, percent: u32, message: &str) {
        for o in &self.observers {
            o.task_progress(task_id, percent, message);
        }
    }

    fn task_finished(&self, task_id: TaskId, result: &AlgorithmResult, elapsed_ms: u64) {
        for o in &self.observers {
            o.task_finished(task_id, result, elapsed_ms);
        }
    }

    fn task_failed(&self, task_id: TaskId, reason: &FailureReason) {
        for o in &self.observers {
            o.task_failed(task_id, reason);
        }
    }

    fn request_parameter_dialog(&self, request: &ParameterRequest) {
        for o in &self.observers {
            o.request_parameter_dialog(request);
        }
    }

    fn request_point_selection(&self, request: &PointRequest) {
        for o in &self.observers {
            o.request_point_selection(request);
        }
    }

    fn show_message(&self, text: &str) {
        for o in &self.observers {
            o.show_message(text);
        }
    }
}

/// Logs every notification through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl EngineObserver for LoggingObserver {
    fn algorithm_failed(&self, algorithm: &str, reason: &str) {
        tracing::error!("Algorithm failed: {} - {}", algorithm, reason);
    }

    fn algorithm_succeeded(&self, algorithm: &str) {
        tracing::info!("Algorithm succeeded: {}", algorithm);
    }

    fn algorithm_completed(
        &self,
        task_id: TaskId,
        algorithm: &str,
        curve_id: &str,
        result: &AlgorithmResult,
    ) {
        tracing::info!(
            "Result stored: {}/{} task {} ({:?})",
            algorithm,
            curve_id,
            task_id,
            result.kind()
        );
    }

    fn task_started(&self, task_id: TaskId, algorithm: &str) {
        tracing::info!("Task started: {} ({})", task_id, algorithm);
    }

    fn task_progress(&self, task_id: TaskId, percent: u32, message: &str) {
        tracing::debug!("Task {} at {}%: {}", task_id, percent, message);
    }

    fn task_finished(&self, task_id: TaskId, _result: &AlgorithmResult, elapsed_ms: u64) {
        tracing::info!("Task finished: {} in {}ms", task_id, elapsed_ms);
    }

    fn task_failed(&self, task_id: TaskId, reason: &FailureReason) {
        tracing::warn!("Task failed: {} - {}", task_id, reason);
    }

    fn request_parameter_dialog(&self, request: &ParameterRequest) {
        tracing::info!(
            "Parameters requested for {} ({} definitions)",
            request.algorithm,
            request.definitions.len()
        );
    }

    fn request_point_selection(&self, request: &PointRequest) {
        tracing::info!(
            "{} point(s) requested on {} for {}",
            request.required_points,
            request.curve_id,
            request.algorithm
        );
    }

    fn show_message(&self, text: &str) {
        tracing::info!("Message: {}", text);
    }
}

/// One captured notification
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    AlgorithmFailed { algorithm: String, reason: String },
    AlgorithmSucceeded { algorithm: String },
    AlgorithmCompleted {
        task_id: TaskId,
        algorithm: String,
        curve_id: String,
        result: AlgorithmResult,
    },
    TaskStarted { task_id: TaskId, algorithm: String },
    TaskProgress { task_id: TaskId, percent: u32, message: String },
    TaskFinished { task_id: TaskId, result: AlgorithmResult, elapsed_ms: u64 },
    TaskFailed { task_id: TaskId, reason: FailureReason },
    ParametersRequested(ParameterRequest),
    PointsRequested(PointRequest),
    Message(String),
}

/// Keeps every notification in order. Useful for tests and scripted UIs.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<ObservedEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().push(event);
    }
}

impl EngineObserver for RecordingObserver {
    fn algorithm_failed(&self, algorithm: &str, reason: &str) {
        self.push(ObservedEvent::AlgorithmFailed {
            algorithm: algorithm.to_string(),
            reason: reason.to_string(),
        });
    }

    fn algorithm_succeeded(&self, algorithm: &str) {
        self.push(ObservedEvent::AlgorithmSucceeded {
            algorithm: algorithm.to_string(),
        });
    }

    fn algorithm_completed(
        &self,
        task_id: TaskId,
        algorithm: &str,
        curve_id: &str,
        result: &AlgorithmResult,
    ) {
        self.push(ObservedEvent::AlgorithmCompleted {
            task_id,
            algorithm: algorithm.to_string(),
            curve_id: curve_id.to_string(),
            result: result.clone(),
        });
    }

    fn task_started(&self, task_id: TaskId, algorithm: &str) {
        self.push(ObservedEvent::TaskStarted {
            task_id,
            algorithm: algorithm.to_string(),
        });
    }

    fn task_progress(&self, task_id: TaskId, percent: u32, message: &str) {
        self.push(ObservedEvent::TaskProgress {
            task_id,
            percent,
            message: message.to_string(),
        });
    }

    fn task_finished(&self, task_id: TaskId, result: &AlgorithmResult, elapsed_ms: u64) {
        self.push(ObservedEvent::TaskFinished {
            task_id,
            result: result.clone(),
            elapsed_ms,
        });
    }

    fn task_failed(&self, task_id: TaskId, reason: &FailureReason) {
        self.push(ObservedEvent::TaskFailed {
            task_id,
            reason: reason.clone(),
        });
    }

    fn request_parameter_dialog(&self, request: &ParameterRequest) {
        self.push(ObservedEvent::ParametersRequested(request.clone()));
    }

    fn request_point_selection(&self, request: &PointRequest) {
        self.push(ObservedEvent::PointsRequested(request.clone()));
    }

    fn show_message(&self, text: &str) {
        self.push(ObservedEvent::Message(text.to_string()));
    }
}
