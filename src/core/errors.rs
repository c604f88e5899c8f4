use std::fmt;
use thiserror::Error;

/// Unified error type for the curveflow engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation errors raised before any task exists
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Lookup of an algorithm that is not registered
    #[error("Unknown algorithm: {name}")]
    UnknownAlgorithm { name: String },

    /// A required context key is missing
    #[error("Missing prerequisite '{key}' for {algorithm}")]
    MissingPrerequisite { algorithm: String, key: String },

    /// The worker pool no longer accepts work
    #[error("Worker pool is shut down")]
    PoolShutdown,

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// IO errors (config files)
    #[error("IO operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn unknown_algorithm<S: Into<String>>(name: S) -> Self {
        Self::UnknownAlgorithm { name: name.into() }
    }

    pub fn missing_prerequisite<A: Into<String>, K: Into<String>>(algorithm: A, key: K) -> Self {
        Self::MissingPrerequisite {
            algorithm: algorithm.into(),
            key: key.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    pub fn io<S: Into<String>>(operation: S, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the error happened before any task was created
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::UnknownAlgorithm { .. } | Self::MissingPrerequisite { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Configuration { .. } => "configuration",
            Self::UnknownAlgorithm { .. } => "registry",
            Self::MissingPrerequisite { .. } => "validation",
            Self::PoolShutdown => "pool",
            Self::Serialization { .. } => "serialization",
            Self::Io { .. } => "io",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

/// Marker error an algorithm returns when it stops because
/// [`ProgressReporter::should_cancel`](crate::exec::ProgressReporter::should_cancel) said so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancelled")
    }
}

impl std::error::Error for Cancelled {}
