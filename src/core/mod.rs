//! Core infrastructure shared by the context store, coordinator and executor

pub mod config;
pub mod errors;
pub mod logging;

pub use config::EngineConfig;
pub use errors::{Cancelled, EngineError, Result};
pub use logging::init_tracing;
