//! InteractionCoordinator - decides how a triggered algorithm gets its input
//!
//! Given a trigger it consults the descriptor and either executes at once or
//! asks the UI for parameters and/or points, resuming once they arrive. At
//! most one request is in flight; a new trigger supersedes it.

use crate::algorithm::descriptor::AlgorithmDescriptor;
use crate::algorithm::registry::AlgorithmRegistry;
use crate::algorithm::unit::InteractionKind;
use crate::context::Context;
use crate::core::errors::EngineError;
use crate::coord::types::{
    ExecutionRequest, InteractionCommand, ParameterRequest, PendingRequest, Phase, PointRequest,
};
use crate::curve::{CurveProvider, Point};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct InteractionCoordinator {
    registry: AlgorithmRegistry,
    curves: Arc<dyn CurveProvider>,
    pending: Option<PendingRequest>,
}

impl InteractionCoordinator {
    pub fn new(registry: AlgorithmRegistry, curves: Arc<dyn CurveProvider>) -> Self {
        Self {
            registry,
            curves,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.pending.as_ref().map(|p| p.phase).unwrap_or_default()
    }

    /// Start an interaction for `name`.
    ///
    /// `preset` counts as supplied when it is non-empty. Validation failures
    /// leave any pending request untouched.
    pub fn handle_trigger(
        &mut self,
        name: &str,
        preset: Map<String, Value>,
        context: &Context,
    ) -> Vec<InteractionCommand> {
        let (descriptor, curve_id) = match self.validate_trigger(name, context) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(algorithm = %name, error = %e, "Trigger rejected");
                return vec![fail(name, e.to_string())];
            }
        };

        let mut commands = Vec::new();
        if let Some(previous) = self.pending.take() {
            info!(previous = %previous.algorithm(), algorithm = %name, "Superseding pending request");
            commands.push(InteractionCommand::Notify(format!(
                "{} was cancelled: {} was started",
                previous.descriptor.display_name, descriptor.display_name
            )));
        }

        let supplied = !preset.is_empty();
        let mut parameters = preset;
        let resolved = descriptor.fill_defaults(&mut parameters);
        debug!(algorithm = %name, kind = ?descriptor.interaction_kind, resolved, supplied, "Resolved trigger");

        let request = PendingRequest {
            points_required: descriptor.required_point_count.max(1),
            descriptor,
            curve_id,
            parameters,
            collected_points: Vec::new(),
            phase: Phase::None,
        };

        match request.descriptor.interaction_kind {
            InteractionKind::None => commands.push(execute(request)),
            InteractionKind::ParameterDialog if resolved || supplied => {
                commands.push(execute(request))
            }
            InteractionKind::ParameterDialog => commands.push(self.await_parameters(request)),
            InteractionKind::PointSelection => commands.push(self.await_points(request)),
            InteractionKind::ParameterThenPoint if resolved || supplied => {
                commands.push(self.await_points(request))
            }
            InteractionKind::ParameterThenPoint => commands.push(self.await_parameters(request)),
        }
        commands
    }

    /// Parameters came back from the dialog. Merged over the defaults.
    pub fn handle_parameter_submission(
        &mut self,
        name: &str,
        parameters: Map<String, Value>,
    ) -> Vec<InteractionCommand> {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|p| p.algorithm() == name && p.phase == Phase::AwaitParameters);
        if !matches {
            debug!(algorithm = %name, "Ignoring parameter submission with no matching request");
            return Vec::new();
        }
        let Some(mut request) = self.pending.take() else {
            return Vec::new();
        };

        let mut merged = request.descriptor.defaults();
        merged.extend(parameters);
        request.parameters = merged;

        match request.descriptor.interaction_kind {
            InteractionKind::ParameterThenPoint => vec![self.await_points(request)],
            _ => vec![execute(request)],
        }
    }

    /// Points came back from the chart.
    pub fn handle_point_selection(&mut self, points: Vec<Point>) -> Vec<InteractionCommand> {
        if self.phase() != Phase::AwaitPoints {
            debug!(count = points.len(), "Ignoring point selection with no pending request");
            return Vec::new();
        }
        let Some(mut request) = self.pending.take() else {
            return Vec::new();
        };
        request.collected_points = points;

        if request.collected_points.len() < request.points_required {
            let reason = EngineError::validation_field(
                format!(
                    "{} needs {} point(s), got {}",
                    request.descriptor.display_name,
                    request.points_required,
                    request.collected_points.len()
                ),
                "points",
            );
            warn!(algorithm = %request.algorithm(), error = %reason, "Point selection rejected");
            return vec![fail(request.algorithm(), reason.to_string())];
        }
        vec![execute(request)]
    }

    /// Drop the pending request, if any. Idempotent.
    pub fn cancel_pending(&mut self) -> Vec<InteractionCommand> {
        match self.pending.take() {
            Some(request) => {
                info!(algorithm = %request.algorithm(), phase = ?request.phase, "Pending request cancelled");
                vec![InteractionCommand::Notify(format!(
                    "{} was cancelled",
                    request.descriptor.display_name
                ))]
            }
            None => Vec::new(),
        }
    }

    fn validate_trigger(
        &self,
        name: &str,
        context: &Context,
    ) -> Result<(AlgorithmDescriptor, String), EngineError> {
        let curve = self
            .curves
            .active_curve()
            .ok_or_else(|| EngineError::validation_field("no curve is selected", "curve"))?;
        let descriptor = self
            .registry
            .descriptor_for(name)
            .ok_or_else(|| EngineError::unknown_algorithm(name))?;
        if let Some(key) = descriptor.prerequisites.iter().find(|key| !context.contains(key)) {
            return Err(EngineError::missing_prerequisite(name, key.as_str()));
        }
        Ok((descriptor, curve.id))
    }

    fn await_parameters(&mut self, mut request: PendingRequest) -> InteractionCommand {
        request.phase = Phase::AwaitParameters;
        let command = InteractionCommand::RequestParameters(ParameterRequest {
            algorithm: request.descriptor.name.clone(),
            display_name: request.descriptor.display_name.clone(),
            definitions: request.descriptor.parameters.clone(),
            initial_values: request.parameters.clone(),
        });
        self.pending = Some(request);
        command
    }

    fn await_points(&mut self, mut request: PendingRequest) -> InteractionCommand {
        request.phase = Phase::AwaitPoints;
        let command = InteractionCommand::RequestPoints(PointRequest {
            algorithm: request.descriptor.name.clone(),
            curve_id: request.curve_id.clone(),
            required_points: request.points_required,
            hint: request.descriptor.point_selection_hint.clone(),
        });
        self.pending = Some(request);
        command
    }
}

impl std::fmt::Debug for InteractionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionCoordinator")
            .field("pending", &self.pending)
            .finish()
    }
}

fn execute(request: PendingRequest) -> InteractionCommand {
    InteractionCommand::Execute(ExecutionRequest {
        algorithm: request.descriptor.name,
        curve_id: request.curve_id,
        parameters: request.parameters,
        points: request.collected_points,
    })
}

fn fail(algorithm: &str, reason: String) -> InteractionCommand {
    InteractionCommand::Fail {
        algorithm: algorithm.to_string(),
        reason,
    }
}
