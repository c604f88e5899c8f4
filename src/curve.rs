//! Curve value types and the curve-provider boundary
//!
//! Curves enter the context by value, so a task snapshot never aliases the
//! curve manager's data.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A picked or sampled point on a chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(with = "sample")]
    pub x: f64,
    #[serde(with = "sample")]
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A data curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub id: String,
    pub name: String,
    pub points: Vec<Point>,
    /// Id of the curve this one was derived from, if any
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Curve {
    pub fn new(id: impl Into<String>, name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            points,
            parent_id: None,
        }
    }

    pub fn from_xy(id: impl Into<String>, xs: &[f64], ys: &[f64]) -> Self {
        let id = id.into();
        let points = xs.iter().zip(ys).map(|(&x, &y)| Point::new(x, y)).collect();
        Self::new(id.clone(), id, points)
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Serde form of a sample value that keeps gaps and overflows.
///
/// JSON has no NaN or infinity, and `serde_json` writes them as `null`.
/// Finite values stay plain numbers; the rest become `"NaN"`, `"inf"` or
/// `"-inf"`.
pub(crate) mod sample {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(SampleVisitor)
    }

    struct SampleVisitor;

    impl<'de> Visitor<'de> for SampleVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
            }
        }
    }
}

/// Source of curves, implemented by the application's curve manager
pub trait CurveProvider: Send + Sync {
    /// The curve currently selected by the user
    fn active_curve(&self) -> Option<Curve>;

    /// Look a curve up by id
    fn curve(&self, id: &str) -> Option<Curve>;
}

/// In-memory curve provider used by the demo and tests
#[derive(Debug, Default)]
pub struct InMemoryCurves {
    curves: RwLock<HashMap<String, Curve>>,
    active: RwLock<Option<String>>,
}

impl InMemoryCurves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, curve: Curve) {
        self.curves.write().insert(curve.id.clone(), curve);
    }

    /// Select a curve; unknown ids are ignored.
    pub fn select(&self, id: &str) -> bool {
        if self.curves.read().contains_key(id) {
            *self.active.write() = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&self) {
        *self.active.write() = None;
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.curves.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl CurveProvider for InMemoryCurves {
    fn active_curve(&self) -> Option<Curve> {
        let active = self.active.read().clone()?;
        self.curve(&active)
    }

    fn curve(&self, id: &str) -> Option<Curve> {
        self.curves.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_requires_known_curve() {
        let curves = InMemoryCurves::new();
        curves.insert(Curve::from_xy("C1", &[0.0, 1.0], &[2.0, 3.0]));

        assert!(curves.active_curve().is_none());
        assert!(!curves.select("C2"));
        assert!(curves.select("C1"));
        assert_eq!(curves.active_curve().map(|c| c.id), Some("C1".to_string()));

        curves.clear_selection();
        assert!(curves.active_curve().is_none());
    }

    #[test]
    fn test_non_finite_samples_keep_their_value() {
        let gap = serde_json::to_value(Point::new(1.0, f64::NAN)).unwrap();
        assert_eq!(gap, serde_json::json!({ "x": 1.0, "y": "NaN" }));
        let back: Point = serde_json::from_value(gap).unwrap();
        assert!(back.y.is_nan());

        let back: Point = serde_json::from_value(serde_json::json!({ "x": 2, "y": "-inf" })).unwrap();
        assert_eq!(back, Point::new(2.0, f64::NEG_INFINITY));
        assert!(serde_json::from_value::<Point>(serde_json::json!({ "x": 0, "y": "nan?" })).is_err());
    }
}
