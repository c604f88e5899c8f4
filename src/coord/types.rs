//! Interaction state and the commands the coordinator emits
//!
//! The coordinator never calls the UI or the executor itself; it returns
//! commands and the engine applies them.

use crate::algorithm::descriptor::AlgorithmDescriptor;
use crate::algorithm::unit::ParameterDefinition;
use crate::curve::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where the single in-flight interaction currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    None,
    AwaitParameters,
    AwaitPoints,
}

/// The coordinator's multi-phase interaction state
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub descriptor: AlgorithmDescriptor,
    pub curve_id: String,
    pub parameters: Map<String, Value>,
    pub points_required: usize,
    pub collected_points: Vec<Point>,
    pub phase: Phase,
}

impl PendingRequest {
    pub fn algorithm(&self) -> &str {
        &self.descriptor.name
    }
}

/// Ask the UI to collect parameter values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRequest {
    pub algorithm: String,
    pub display_name: String,
    pub definitions: Vec<ParameterDefinition>,
    pub initial_values: Map<String, Value>,
}

/// Ask the UI to collect points on a curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRequest {
    pub algorithm: String,
    pub curve_id: String,
    pub required_points: usize,
    pub hint: String,
}

/// Everything needed to stage the context and dispatch a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub algorithm: String,
    pub curve_id: String,
    pub parameters: Map<String, Value>,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionCommand {
    Execute(ExecutionRequest),
    RequestParameters(ParameterRequest),
    RequestPoints(PointRequest),
    Fail { algorithm: String, reason: String },
    Notify(String),
}
