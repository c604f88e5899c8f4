use crate::core::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of workers in the pool
    pub max_workers: usize,
    /// Number of results kept per (algorithm, curve) pair
    pub history_depth: usize,
    /// Grace period given to workers on shutdown before they are aborted
    pub shutdown_grace_ms: u64,
    /// Capacity of the context change broadcast channel
    pub context_event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            history_depth: 10,
            shutdown_grace_ms: 2_000,
            context_event_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(EngineError::configuration_field(
                "max_workers must be greater than 0",
                "max_workers",
            ));
        }
        if self.history_depth == 0 {
            return Err(EngineError::configuration_field(
                "history_depth must be greater than 0",
                "history_depth",
            ));
        }
        if self.context_event_capacity == 0 {
            return Err(EngineError::configuration_field(
                "context_event_capacity must be greater than 0",
                "context_event_capacity",
            ));
        }
        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Parse and validate a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine config from {:?}", path);
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io(format!("read {}", path.display()), e))?;
        Self::from_yaml_str(&text)
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }
}
