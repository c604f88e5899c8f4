//! Interaction coordination: the trigger state machine and observer hooks

pub mod coordinator;
pub mod hooks;
pub mod types;

pub use coordinator::InteractionCoordinator;
pub use hooks::{CompositeObserver, EngineObserver, LoggingObserver, ObservedEvent, RecordingObserver};
pub use types::{
    ExecutionRequest, InteractionCommand, ParameterRequest, PendingRequest, Phase, PointRequest,
};
