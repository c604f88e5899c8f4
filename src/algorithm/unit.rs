//! Algorithm units - named, compute-only plugins
//!
//! A unit reads its inputs from the task's context snapshot, does its work
//! while polling the reporter for cancellation, and returns a result. It never
//! touches engine state directly.

use crate::algorithm::result::AlgorithmResult;
use crate::context::Context;
use crate::exec::reporter::ProgressReporter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How an algorithm wants to be invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Run immediately
    None,
    /// Ask for parameters first
    ParameterDialog,
    /// Ask for picked points first
    PointSelection,
    /// Ask for parameters, then for points
    ParameterThenPoint,
}

impl InteractionKind {
    pub fn needs_points(self) -> bool {
        matches!(self, Self::PointSelection | Self::ParameterThenPoint)
    }
}

/// Declared type of a parameter, used by the parameter dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Float,
    Bool,
    String,
    List,
    Object,
    #[default]
    Unknown,
}

impl ValueType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Unknown,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Object,
        }
    }
}

/// One parameter an algorithm accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub required: bool,
    /// `min`, `max`, `step`, `options`, ... for the dialog only
    #[serde(default)]
    pub constraints: Map<String, Value>,
}

impl ParameterDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value_type: ValueType::Unknown,
            default_value: Value::Null,
            required: false,
            constraints: Map::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        if self.value_type == ValueType::Unknown {
            self.value_type = ValueType::of(&self.default_value);
        }
        self
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_constraint(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.insert(name.into(), value.into());
        self
    }
}

/// Algorithm unit contract.
///
/// Only `name` and `execute_with_context` are mandatory; everything else
/// describes how the unit wants to be invoked and has a neutral default.
pub trait Algorithm: Send + Sync + 'static {
    /// Registry key
    fn name(&self) -> &str;

    /// Label for menus and messages
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Explicit interaction kind. `None` lets the descriptor resolver infer one.
    fn interaction_kind(&self) -> Option<InteractionKind> {
        None
    }

    /// Whether the unit needs picked points, for units that do not declare a kind
    fn requires_point_selection(&self) -> bool {
        false
    }

    /// Number of points to pick; values below 1 mean "not declared"
    fn required_point_count(&self) -> usize {
        0
    }

    fn point_selection_hint(&self) -> String {
        String::new()
    }

    /// Declared parameters, in dialog order
    fn describe_parameters(&self) -> Vec<ParameterDefinition> {
        Vec::new()
    }

    /// Currently configured parameter values. Seeds defaults and surfaces
    /// ad hoc parameters that have no declaration.
    fn parameters(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Context keys that must exist before the unit can be triggered
    fn prerequisites(&self) -> Vec<String> {
        Vec::new()
    }

    /// Cheap check on the staged context before a task is created
    fn prepare_context(&self, _context: &Context) -> bool {
        true
    }

    /// Run against the task's private context snapshot.
    ///
    /// Implementations should poll `reporter.should_cancel()` regularly (about
    /// every hundred inner-loop iterations) and return
    /// [`Cancelled`](crate::core::errors::Cancelled) when it is set.
    fn execute_with_context(
        &self,
        context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<AlgorithmResult>;
}
