//! curveflow - interactive algorithm execution for curve analysis
//!
//! A trigger names an algorithm; the [`InteractionCoordinator`] works out
//! whether it needs parameters or picked points, the [`Engine`] stages the
//! [`Context`] blackboard and snapshots it into a [`Task`], and the worker
//! pool runs it off the caller's task, reporting progress and results back
//! through [`EngineObserver`].
//!
//! ```no_run
//! use curveflow::{Engine, EngineConfig, InMemoryCurves, LoggingObserver};
//! use std::sync::Arc;
//!
//! # async fn run() -> curveflow::Result<()> {
//! let curves = Arc::new(InMemoryCurves::new());
//! let mut engine = Engine::builder()
//!     .with_config(EngineConfig::default().with_max_workers(2))
//!     .with_curves(curves)
//!     .with_observer(Arc::new(LoggingObserver))
//!     .build()?;
//! engine.trigger("smooth");
//! engine.run_until_idle().await;
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod context;
pub mod coord;
pub mod core;
pub mod curve;
pub mod engine;
pub mod exec;

pub use algorithm::{
    Algorithm, AlgorithmDescriptor, AlgorithmRegistry, AlgorithmResult, AlgorithmSummary,
    InteractionKind, ParameterDefinition, ResultDispatcher, ResultHandler, ResultKind,
    ResultPayload, ValueType,
};
pub use context::{Context, ContextEntry, ContextEvent, LastRun};
pub use coord::{
    CompositeObserver, EngineObserver, ExecutionRequest, InteractionCommand,
    InteractionCoordinator, LoggingObserver, ObservedEvent, ParameterRequest, PendingRequest,
    Phase, PointRequest, RecordingObserver,
};
pub use core::{init_tracing, Cancelled, EngineConfig, EngineError, Result};
pub use curve::{Curve, CurveProvider, InMemoryCurves, Point};
pub use engine::{Engine, EngineBuilder};
pub use exec::{
    CancelFlag, FailureReason, NoopReporter, PoolStats, ProgressReporter, Task, TaskId,
    WorkerEvent, WorkerId,
};
