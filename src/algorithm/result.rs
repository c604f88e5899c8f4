//! Algorithm results and routing them by kind

use crate::curve::{Curve, Point};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// What an algorithm produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    /// A derived curve (derivative, baseline, ...)
    Curve { curve: Curve },
    /// Points to overlay on the parent curve
    Markers { points: Vec<Point> },
    /// A single measurement (peak area, ...)
    Scalar {
        #[serde(with = "crate::curve::sample")]
        value: f64,
        #[serde(default)]
        unit: Option<String>,
    },
    /// Tabular output, one map per row
    Table { rows: Vec<Map<String, Value>> },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Curve,
    Markers,
    Scalar,
    Table,
    Empty,
}

impl ResultPayload {
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Curve { .. } => ResultKind::Curve,
            Self::Markers { .. } => ResultKind::Markers,
            Self::Scalar { .. } => ResultKind::Scalar,
            Self::Table { .. } => ResultKind::Table,
            Self::Empty => ResultKind::Empty,
        }
    }
}

/// Output of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Filled in by the worker when left empty
    #[serde(default)]
    pub algorithm: String,
    /// Curve the algorithm ran against; filled in by the worker when left empty
    #[serde(default)]
    pub parent_curve_id: String,
    pub payload: ResultPayload,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AlgorithmResult {
    pub fn new(payload: ResultPayload) -> Self {
        Self {
            algorithm: String::new(),
            parent_curve_id: String::new(),
            payload,
            metadata: Map::new(),
        }
    }

    pub fn curve(curve: Curve) -> Self {
        Self::new(ResultPayload::Curve { curve })
    }

    pub fn markers(points: Vec<Point>) -> Self {
        Self::new(ResultPayload::Markers { points })
    }

    pub fn scalar(value: f64, unit: Option<&str>) -> Self {
        Self::new(ResultPayload::Scalar {
            value,
            unit: unit.map(str::to_string),
        })
    }

    pub fn table(rows: Vec<Map<String, Value>>) -> Self {
        Self::new(ResultPayload::Table { rows })
    }

    pub fn empty() -> Self {
        Self::new(ResultPayload::Empty)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ResultKind {
        self.payload.kind()
    }

    /// Fill provenance the algorithm left blank.
    pub(crate) fn stamp(&mut self, algorithm: &str, curve_id: Option<&str>) {
        if self.algorithm.is_empty() {
            self.algorithm = algorithm.to_string();
        }
        if self.parent_curve_id.is_empty() {
            if let Some(curve_id) = curve_id {
                self.parent_curve_id = curve_id.to_string();
            }
        }
        if let ResultPayload::Curve { curve } = &mut self.payload {
            if curve.parent_id.is_none() && !self.parent_curve_id.is_empty() {
                curve.parent_id = Some(self.parent_curve_id.clone());
            }
        }
    }
}

/// Consumer of one kind of result (curve manager, overlay layer, ...)
pub trait ResultHandler: Send + Sync {
    fn handle(&self, result: &AlgorithmResult);
}

impl<F> ResultHandler for F
where
    F: Fn(&AlgorithmResult) + Send + Sync,
{
    fn handle(&self, result: &AlgorithmResult) {
        self(result)
    }
}

/// Routes finished results to the handlers registered for their kind
#[derive(Clone, Default)]
pub struct ResultDispatcher {
    handlers: HashMap<ResultKind, Vec<Arc<dyn ResultHandler>>>,
}

impl ResultDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ResultKind, handler: Arc<dyn ResultHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    pub fn has_handler(&self, kind: ResultKind) -> bool {
        self.handlers.get(&kind).is_some_and(|h| !h.is_empty())
    }

    /// Returns the number of handlers that saw the result.
    pub fn dispatch(&self, result: &AlgorithmResult) -> usize {
        let Some(handlers) = self.handlers.get(&result.kind()) else {
            debug!(algorithm = %result.algorithm, kind = ?result.kind(), "No handler for result kind");
            return 0;
        };
        for handler in handlers {
            handler.handle(result);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for ResultDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.handlers.keys().collect();
        f.debug_struct("ResultDispatcher").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_stamp_fills_only_blank_fields() {
        let mut result = AlgorithmResult::curve(Curve::from_xy("d1", &[0.0], &[1.0]));
        result.stamp("derivative", Some("C1"));
        assert_eq!(result.algorithm, "derivative");
        assert_eq!(result.parent_curve_id, "C1");
        match &result.payload {
            ResultPayload::Curve { curve } => assert_eq!(curve.parent_id.as_deref(), Some("C1")),
            other => panic!("unexpected payload {other:?}"),
        }

        let mut named = AlgorithmResult::scalar(1.5, Some("au"));
        named.parent_curve_id = "C9".into();
        named.stamp("area", Some("C1"));
        assert_eq!(named.parent_curve_id, "C9");
    }

    #[test]
    fn test_dispatch_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = ResultDispatcher::new();
        let sink = seen.clone();
        dispatcher.register(
            ResultKind::Scalar,
            Arc::new(move |r: &AlgorithmResult| sink.lock().push(r.algorithm.clone())),
        );

        let mut area = AlgorithmResult::scalar(4.2, None);
        area.algorithm = "area".into();
        assert_eq!(dispatcher.dispatch(&area), 1);
        assert_eq!(dispatcher.dispatch(&AlgorithmResult::empty()), 0);
        assert_eq!(seen.lock().as_slice(), ["area".to_string()]);
        assert!(dispatcher.has_handler(ResultKind::Scalar));
        assert!(!dispatcher.has_handler(ResultKind::Curve));
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let value = serde_json::to_value(AlgorithmResult::scalar(2.0, None)).unwrap();
        assert_eq!(value["payload"]["kind"], json!("scalar"));
        let back: AlgorithmResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), ResultKind::Scalar);
    }
}
