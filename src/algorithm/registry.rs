//! Name-keyed table of algorithm units, built at startup
//!
//! Also the execution entry point: `dispatch` snapshots the staged context
//! into a [`Task`] and hands it to the executor.

use crate::algorithm::descriptor::AlgorithmDescriptor;
use crate::algorithm::unit::{Algorithm, InteractionKind};
use crate::context::Context;
use crate::core::errors::{EngineError, Result};
use crate::exec::executor::TaskExecutor;
use crate::exec::task::{Task, TaskId};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Menu entry for one registered algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmSummary {
    pub name: String,
    pub display_name: String,
    pub interaction_kind: InteractionKind,
}

/// Registry for algorithm units
#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    units: Arc<DashMap<String, Arc<dyn Algorithm>>>,
}

impl AlgorithmRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under its own name, replacing any previous one.
    pub fn register(&self, unit: Arc<dyn Algorithm>) -> Result<()> {
        let name = unit.name().to_string();
        if name.is_empty() {
            return Err(EngineError::validation_field(
                "algorithm name must not be empty",
                "name",
            ));
        }
        if self.units.insert(name.clone(), unit).is_some() {
            warn!(algorithm = %name, "Replaced previously registered algorithm");
        } else {
            debug!(algorithm = %name, "Registered algorithm");
        }
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Algorithm>> {
        self.units.remove(name).map(|(_, unit)| unit)
    }

    /// Get a unit by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Algorithm>> {
        self.units.get(name).map(|entry| entry.value().clone())
    }

    /// Check if a unit is registered
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn describe_all(&self) -> Vec<AlgorithmSummary> {
        self.list()
            .into_iter()
            .filter_map(|name| {
                let descriptor = self.descriptor_for(&name)?;
                Some(AlgorithmSummary {
                    name,
                    display_name: descriptor.display_name,
                    interaction_kind: descriptor.interaction_kind,
                })
            })
            .collect()
    }

    /// Resolve the interaction descriptor for `name` from the unit's current state.
    pub fn descriptor_for(&self, name: &str) -> Option<AlgorithmDescriptor> {
        let unit = self.get(name)?;
        Some(AlgorithmDescriptor::resolve(unit.as_ref()))
    }

    /// Snapshot `context` into a new task and submit it.
    ///
    /// Fails without creating a task when the name is unknown or the unit's
    /// `prepare_context` check rejects the staged context.
    pub fn dispatch(
        &self,
        name: &str,
        context: &Context,
        executor: &mut TaskExecutor,
    ) -> Result<TaskId> {
        let unit = self
            .get(name)
            .ok_or_else(|| EngineError::unknown_algorithm(name))?;

        if !unit.prepare_context(context) {
            return Err(EngineError::validation(format!(
                "context not ready for {}",
                unit.display_name()
            )));
        }

        let task = Task::new(name, context.clone());
        let task_id = task.id();
        executor.submit(task)?;
        info!(task_id = %task_id, algorithm = %name, "Dispatched task");
        Ok(task_id)
    }
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("algorithms", &self.list())
            .finish()
    }
}
