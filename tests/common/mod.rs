//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use curveflow::context::keys;
use curveflow::{
    Algorithm, AlgorithmResult, Cancelled, Context, Curve, Engine, EngineConfig, InMemoryCurves,
    InteractionKind, ObservedEvent, ParameterDefinition, Point, ProgressReporter,
    RecordingObserver, TaskId,
};
use std::sync::Arc;
use std::time::Duration;

/// Straight line through two picked points, sampled at the curve's x values
pub struct Baseline;

impl Algorithm for Baseline {
    fn name(&self) -> &str {
        "baseline"
    }

    fn display_name(&self) -> &str {
        "Baseline"
    }

    fn interaction_kind(&self) -> Option<InteractionKind> {
        Some(InteractionKind::PointSelection)
    }

    fn required_point_count(&self) -> usize {
        2
    }

    fn point_selection_hint(&self) -> String {
        "Pick the two baseline anchors".to_string()
    }

    fn execute_with_context(
        &self,
        context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<AlgorithmResult> {
        let curve: Curve = context
            .get(keys::ACTIVE_CURVE)
            .ok_or_else(|| anyhow::anyhow!("no curve in context"))?;
        let anchors: Vec<Point> = context
            .get(keys::SELECTED_POINTS)
            .ok_or_else(|| anyhow::anyhow!("no anchors in context"))?;
        let (a, b) = (anchors[0], anchors[1]);
        let slope = if (b.x - a.x).abs() < f64::EPSILON {
            0.0
        } else {
            (b.y - a.y) / (b.x - a.x)
        };

        let total = curve.len().max(1);
        let mut points = Vec::with_capacity(curve.len());
        for (i, p) in curve.points.iter().enumerate() {
            if reporter.should_cancel() {
                return Err(Cancelled.into());
            }
            points.push(Point::new(p.x, a.y + slope * (p.x - a.x)));
            reporter.report_progress(((i + 1) * 100 / total) as u32, "fitting baseline");
        }
        Ok(AlgorithmResult::curve(Curve::new(
            format!("{}-baseline", curve.id),
            "Baseline",
            points,
        )))
    }
}

/// Moving average with an optional `window` parameter
pub struct Smooth;

impl Algorithm for Smooth {
    fn name(&self) -> &str {
        "smooth"
    }

    fn interaction_kind(&self) -> Option<InteractionKind> {
        Some(InteractionKind::None)
    }

    fn describe_parameters(&self) -> Vec<ParameterDefinition> {
        vec![ParameterDefinition::new("window", "Window").with_default(5)]
    }

    fn execute_with_context(
        &self,
        context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<AlgorithmResult> {
        let curve: Curve = context
            .get(keys::ACTIVE_CURVE)
            .ok_or_else(|| anyhow::anyhow!("no curve in context"))?;
        let window: usize = context.get(&keys::param("window")).unwrap_or(5).max(1);
        let half = window / 2;
        let n = curve.len();
        let points = (0..n)
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(n);
                let mean = curve.points[lo..hi].iter().map(|p| p.y).sum::<f64>() / (hi - lo) as f64;
                Point::new(curve.points[i].x, mean)
            })
            .collect();
        reporter.report_progress(100, "smoothed");
        Ok(AlgorithmResult::curve(Curve::new(
            format!("{}-smooth", curve.id),
            "Smoothed",
            points,
        ))
        .with_metadata("window", window as u64))
    }
}

/// Sleeps through `steps` slices, polling for cancellation
pub struct Slow {
    pub name: &'static str,
    pub steps: u32,
    pub step: Duration,
}

impl Slow {
    pub fn new(name: &'static str, steps: u32) -> Self {
        Self {
            name,
            steps,
            step: Duration::from_millis(5),
        }
    }
}

impl Algorithm for Slow {
    fn name(&self) -> &str {
        self.name
    }

    fn execute_with_context(
        &self,
        _context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<AlgorithmResult> {
        for i in 1..=self.steps {
            if reporter.should_cancel() {
                return Err(Cancelled.into());
            }
            std::thread::sleep(self.step);
            reporter.report_progress(i * 100 / self.steps, "sleeping");
        }
        Ok(AlgorithmResult::scalar(self.steps as f64, Some("steps")))
    }
}

/// Blocks for `duration` without ever polling for cancellation
pub struct Stubborn(pub Duration);

impl Algorithm for Stubborn {
    fn name(&self) -> &str {
        "stubborn"
    }

    fn execute_with_context(
        &self,
        _context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<AlgorithmResult> {
        std::thread::sleep(self.0);
        reporter.report_progress(100, "woke up");
        Ok(AlgorithmResult::empty())
    }
}

pub struct Panicky;

impl Algorithm for Panicky {
    fn name(&self) -> &str {
        "panicky"
    }

    fn execute_with_context(
        &self,
        _context: &mut Context,
        _reporter: &dyn ProgressReporter,
    ) -> anyhow::Result<AlgorithmResult> {
        panic!("division by zero in peak fit")
    }
}

pub fn sample_curve() -> Curve {
    let xs: Vec<f64> = (0..20).map(f64::from).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 2.0 + 0.5 * x + (x * 0.7).sin()).collect();
    Curve::from_xy("C1", &xs, &ys)
}

pub struct Harness {
    pub engine: Engine,
    pub observer: Arc<RecordingObserver>,
    pub curves: Arc<InMemoryCurves>,
}

pub fn harness(config: EngineConfig, units: Vec<Arc<dyn Algorithm>>) -> Harness {
    curveflow::core::logging::init_test_tracing();

    let curves = Arc::new(InMemoryCurves::new());
    curves.insert(sample_curve());
    curves.select("C1");

    let observer = Arc::new(RecordingObserver::new());
    let mut builder = Engine::builder()
        .with_config(config)
        .with_curves(curves.clone())
        .with_observer(observer.clone());
    for unit in units {
        builder = builder.register(unit).unwrap();
    }
    Harness {
        engine: builder.build().unwrap(),
        observer,
        curves,
    }
}

impl Harness {
    pub async fn settle(&mut self) {
        tokio::time::timeout(Duration::from_secs(10), self.engine.run_until_idle())
            .await
            .expect("engine did not go idle");
    }
}

pub fn task_events(events: &[ObservedEvent], id: TaskId) -> Vec<ObservedEvent> {
    events
        .iter()
        .filter(|e| match e {
            ObservedEvent::TaskStarted { task_id, .. }
            | ObservedEvent::TaskProgress { task_id, .. }
            | ObservedEvent::TaskFinished { task_id, .. }
            | ObservedEvent::TaskFailed { task_id, .. } => *task_id == id,
            _ => false,
        })
        .cloned()
        .collect()
}

pub fn failures(events: &[ObservedEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            ObservedEvent::AlgorithmFailed { algorithm, reason } => {
                Some((algorithm.clone(), reason.clone()))
            }
            _ => None,
        })
        .collect()
}

pub fn points(n: usize) -> Vec<Point> {
    (0..n).map(|i| Point::new(i as f64 * 10.0, 2.0 + i as f64)).collect()
}
