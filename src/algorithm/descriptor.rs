use crate::algorithm::unit::{Algorithm, InteractionKind, ParameterDefinition, ValueType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Normalized description of how an algorithm is invoked.
///
/// Built fresh on every trigger so live parameter values are picked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    pub name: String,
    pub display_name: String,
    pub interaction_kind: InteractionKind,
    pub parameters: Vec<ParameterDefinition>,
    /// At least 1 whenever `interaction_kind` needs points
    pub required_point_count: usize,
    pub point_selection_hint: String,
    pub prerequisites: BTreeSet<String>,
}

impl AlgorithmDescriptor {
    pub fn resolve(unit: &dyn Algorithm) -> Self {
        let parameters = merge_parameters(unit.describe_parameters(), unit.parameters());

        let interaction_kind = match unit.interaction_kind() {
            Some(kind) => kind,
            None if unit.requires_point_selection() => InteractionKind::PointSelection,
            None if parameters.is_empty() => InteractionKind::None,
            None => InteractionKind::ParameterDialog,
        };

        let declared_points = unit.required_point_count();
        let required_point_count = if interaction_kind.needs_points() {
            declared_points.max(1)
        } else {
            declared_points
        };

        Self {
            name: unit.name().to_string(),
            display_name: unit.display_name().to_string(),
            interaction_kind,
            parameters,
            required_point_count,
            point_selection_hint: unit.point_selection_hint(),
            prerequisites: unit.prerequisites().into_iter().collect(),
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|def| def.key == key)
    }

    /// Fill every missing key that has a default into `values`.
    ///
    /// Returns `true` when all required parameters end up with a value.
    pub fn fill_defaults(&self, values: &mut Map<String, Value>) -> bool {
        let mut resolved = true;
        for def in &self.parameters {
            let present = values.get(&def.key).is_some_and(|v| !v.is_null());
            if !present && !def.default_value.is_null() {
                values.insert(def.key.clone(), def.default_value.clone());
            }
            if def.required && !values.get(&def.key).is_some_and(|v| !v.is_null()) {
                resolved = false;
            }
        }
        resolved
    }

    /// Defaults-only parameter map
    pub fn defaults(&self) -> Map<String, Value> {
        let mut values = Map::new();
        self.fill_defaults(&mut values);
        values
    }
}

fn merge_parameters(
    mut declared: Vec<ParameterDefinition>,
    live: Map<String, Value>,
) -> Vec<ParameterDefinition> {
    for (key, value) in live {
        if value.is_null() {
            continue;
        }
        match declared.iter_mut().find(|def| def.key == key) {
            Some(def) => {
                if def.default_value.is_null() {
                    def.default_value = value.clone();
                }
                if def.value_type == ValueType::Unknown {
                    def.value_type = ValueType::of(&value);
                }
            }
            None => {
                let mut synthesized = ParameterDefinition::new(key.clone(), key);
                synthesized.value_type = ValueType::of(&value);
                synthesized.default_value = value;
                declared.push(synthesized);
            }
        }
    }
    declared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::result::AlgorithmResult;
    use crate::context::Context;
    use crate::exec::reporter::ProgressReporter;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Stub {
        kind: Option<InteractionKind>,
        wants_points: bool,
        points: usize,
        declared: Vec<ParameterDefinition>,
        live: Map<String, Value>,
    }

    impl Algorithm for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        fn interaction_kind(&self) -> Option<InteractionKind> {
            self.kind
        }
        fn requires_point_selection(&self) -> bool {
            self.wants_points
        }
        fn required_point_count(&self) -> usize {
            self.points
        }
        fn describe_parameters(&self) -> Vec<ParameterDefinition> {
            self.declared.clone()
        }
        fn parameters(&self) -> Map<String, Value> {
            self.live.clone()
        }
        fn execute_with_context(
            &self,
            _context: &mut Context,
            _reporter: &dyn ProgressReporter,
        ) -> anyhow::Result<AlgorithmResult> {
            Ok(AlgorithmResult::empty())
        }
    }

    #[test]
    fn test_point_selection_defaults_to_one_point() {
        let unit = Stub {
            kind: Some(InteractionKind::PointSelection),
            ..Default::default()
        };
        let desc = AlgorithmDescriptor::resolve(&unit);
        assert_eq!(desc.required_point_count, 1);
    }

    #[test]
    fn test_parameter_then_point_keeps_positive_count() {
        let unit = Stub {
            kind: Some(InteractionKind::ParameterThenPoint),
            points: 3,
            ..Default::default()
        };
        assert_eq!(AlgorithmDescriptor::resolve(&unit).required_point_count, 3);
    }

    #[test]
    fn test_inferred_kinds() {
        let points = Stub {
            wants_points: true,
            ..Default::default()
        };
        let desc = AlgorithmDescriptor::resolve(&points);
        assert_eq!(desc.interaction_kind, InteractionKind::PointSelection);
        assert_eq!(desc.required_point_count, 1);

        let bare = Stub::default();
        assert_eq!(AlgorithmDescriptor::resolve(&bare).interaction_kind, InteractionKind::None);

        let params = Stub {
            declared: vec![ParameterDefinition::new("order", "Order").with_default(2)],
            ..Default::default()
        };
        assert_eq!(
            AlgorithmDescriptor::resolve(&params).interaction_kind,
            InteractionKind::ParameterDialog
        );
    }

    #[test]
    fn test_live_values_seed_and_synthesize() {
        let mut live = Map::new();
        live.insert("order".into(), json!(3));
        live.insert("tolerance".into(), json!(0.01));
        let unit = Stub {
            kind: Some(InteractionKind::ParameterDialog),
            declared: vec![ParameterDefinition::new("order", "Order").required()],
            live,
            ..Default::default()
        };

        let desc = AlgorithmDescriptor::resolve(&unit);
        let order = desc.parameter("order").unwrap();
        assert_eq!(order.default_value, json!(3));
        assert_eq!(order.value_type, ValueType::Integer);
        assert!(order.required);

        let tolerance = desc.parameter("tolerance").unwrap();
        assert!(!tolerance.required);
        assert_eq!(tolerance.value_type, ValueType::Float);
        assert_eq!(tolerance.default_value, json!(0.01));
    }

    #[test]
    fn test_live_value_does_not_override_declared_default() {
        let mut live = Map::new();
        live.insert("window".into(), json!(9));
        let unit = Stub {
            declared: vec![ParameterDefinition::new("window", "Window").with_default(5)],
            live,
            ..Default::default()
        };
        let desc = AlgorithmDescriptor::resolve(&unit);
        assert_eq!(desc.parameter("window").unwrap().default_value, json!(5));
    }

    #[test]
    fn test_fill_defaults_reports_unresolved_required() {
        let unit = Stub {
            declared: vec![
                ParameterDefinition::new("window", "Window").with_default(5),
                ParameterDefinition::new("threshold", "Threshold").required(),
            ],
            ..Default::default()
        };
        let desc = AlgorithmDescriptor::resolve(&unit);

        let mut values = Map::new();
        assert!(!desc.fill_defaults(&mut values));
        assert_eq!(values.get("window"), Some(&json!(5)));

        values.insert("threshold".into(), json!(0.2));
        values.insert("window".into(), json!(7));
        assert!(desc.fill_defaults(&mut values));
        assert_eq!(values.get("window"), Some(&json!(7)));
    }
}
