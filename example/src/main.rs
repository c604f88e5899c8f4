use anyhow::{anyhow, Result};
use curveflow::context::keys;
use curveflow::{
    Algorithm, AlgorithmResult, Cancelled, Context, Curve, Engine, EngineConfig, EngineObserver,
    InMemoryCurves, InteractionKind, LoggingObserver, ParameterDefinition, ParameterRequest,
    Point, PointRequest, ProgressReporter, ResultKind,
};
use serde_json::{json, Map};
use std::sync::Arc;
use tracing::{info, Level};

const CONFIG: &str = r#"
max_workers: 2
history_depth: 5
shutdown_grace_ms: 1000
"#;

fn active_curve(context: &Context) -> Result<Curve> {
    context
        .get(keys::ACTIVE_CURVE)
        .ok_or_else(|| anyhow!("no curve staged"))
}

// Moving average; runs without any interaction.
struct Smooth;

impl Algorithm for Smooth {
    fn name(&self) -> &str {
        "smooth"
    }

    fn display_name(&self) -> &str {
        "Smooth"
    }

    fn interaction_kind(&self) -> Option<InteractionKind> {
        Some(InteractionKind::None)
    }

    fn describe_parameters(&self) -> Vec<ParameterDefinition> {
        vec![ParameterDefinition::new("window", "Window")
            .with_default(5)
            .with_constraint("min", 1)
            .with_constraint("step", 2)]
    }

    fn execute_with_context(
        &self,
        context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> Result<AlgorithmResult> {
        let curve = active_curve(context)?;
        let window: usize = context.get(&keys::param("window")).unwrap_or(5);
        let half = window.max(1) / 2;
        let n = curve.len();
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            if i % 100 == 0 && reporter.should_cancel() {
                return Err(Cancelled.into());
            }
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let mean = curve.points[lo..hi].iter().map(|p| p.y).sum::<f64>() / (hi - lo) as f64;
            points.push(Point::new(curve.points[i].x, mean));
            if n >= 10 && i % (n / 10) == 0 {
                reporter.report_progress((i * 100 / n) as u32, "smoothing");
            }
        }
        reporter.report_progress(100, "done");
        Ok(AlgorithmResult::curve(Curve::new(
            format!("{}-smooth", curve.id),
            format!("{} (smoothed)", curve.name),
            points,
        )))
    }
}

// Finite-difference derivative; no declared kind, inferred as None.
struct Derivative;

impl Algorithm for Derivative {
    fn name(&self) -> &str {
        "derivative"
    }

    fn execute_with_context(
        &self,
        context: &mut Context,
        _reporter: &dyn ProgressReporter,
    ) -> Result<AlgorithmResult> {
        let curve = active_curve(context)?;
        let points = curve
            .points
            .windows(2)
            .map(|w| Point::new((w[0].x + w[1].x) / 2.0, (w[1].y - w[0].y) / (w[1].x - w[0].x)))
            .collect();
        Ok(AlgorithmResult::curve(Curve::new(
            format!("{}-d1", curve.id),
            format!("d/dx {}", curve.name),
            points,
        )))
    }
}

// Two picked anchors define a straight baseline.
struct Baseline;

impl Algorithm for Baseline {
    fn name(&self) -> &str {
        "baseline"
    }

    fn display_name(&self) -> &str {
        "Linear baseline"
    }

    fn requires_point_selection(&self) -> bool {
        true
    }

    fn required_point_count(&self) -> usize {
        2
    }

    fn point_selection_hint(&self) -> String {
        "Click two points on the baseline".to_string()
    }

    fn execute_with_context(
        &self,
        context: &mut Context,
        _reporter: &dyn ProgressReporter,
    ) -> Result<AlgorithmResult> {
        let curve = active_curve(context)?;
        let anchors: Vec<Point> = context
            .get(keys::SELECTED_POINTS)
            .ok_or_else(|| anyhow!("no anchors picked"))?;
        let [a, b] = anchors.as_slice() else {
            return Err(anyhow!("expected two anchors, got {}", anchors.len()));
        };
        let slope = (b.y - a.y) / (b.x - a.x);
        let points = curve
            .points
            .iter()
            .map(|p| Point::new(p.x, a.y + slope * (p.x - a.x)))
            .collect();
        Ok(AlgorithmResult::curve(Curve::new(
            format!("{}-baseline", curve.id),
            "Baseline",
            points,
        )))
    }
}

// Area between two picked bounds, method chosen in a dialog first.
struct PeakArea;

impl Algorithm for PeakArea {
    fn name(&self) -> &str {
        "peak_area"
    }

    fn display_name(&self) -> &str {
        "Peak area"
    }

    fn interaction_kind(&self) -> Option<InteractionKind> {
        Some(InteractionKind::ParameterThenPoint)
    }

    fn required_point_count(&self) -> usize {
        2
    }

    fn point_selection_hint(&self) -> String {
        "Click the left and right bounds of the peak".to_string()
    }

    fn describe_parameters(&self) -> Vec<ParameterDefinition> {
        vec![ParameterDefinition::new("method", "Integration method")
            .required()
            .with_constraint("options", json!(["trapezoid", "rectangle"]))]
    }

    fn execute_with_context(
        &self,
        context: &mut Context,
        reporter: &dyn ProgressReporter,
    ) -> Result<AlgorithmResult> {
        let curve = active_curve(context)?;
        let bounds: Vec<Point> = context.get(keys::SELECTED_POINTS).unwrap_or_default();
        let method: String = context
            .get(&keys::param("method"))
            .unwrap_or_else(|| "trapezoid".to_string());
        let (lo, hi) = match bounds.as_slice() {
            [a, b, ..] => (a.x.min(b.x), a.x.max(b.x)),
            _ => return Err(anyhow!("peak bounds missing")),
        };

        let inside: Vec<&Point> = curve.points.iter().filter(|p| p.x >= lo && p.x <= hi).collect();
        let mut area = 0.0;
        for (i, w) in inside.windows(2).enumerate() {
            if reporter.should_cancel() {
                return Err(Cancelled.into());
            }
            let dx = w[1].x - w[0].x;
            area += match method.as_str() {
                "rectangle" => w[0].y * dx,
                _ => (w[0].y + w[1].y) / 2.0 * dx,
            };
            reporter.report_progress(((i + 1) * 100 / inside.len().max(1)) as u32, "integrating");
        }
        Ok(AlgorithmResult::scalar(area, Some("a.u.")).with_metadata("method", method))
    }
}

/// Console stand-in for the parameter dialog and chart
struct ConsoleUi;

impl EngineObserver for ConsoleUi {
    fn request_parameter_dialog(&self, request: &ParameterRequest) {
        println!(
            "[dialog] {} wants: {:?}",
            request.display_name,
            request.definitions.iter().map(|d| &d.key).collect::<Vec<_>>()
        );
    }

    fn request_point_selection(&self, request: &PointRequest) {
        println!(
            "[chart] {} on {}: {} ({} point(s))",
            request.algorithm, request.curve_id, request.hint, request.required_points
        );
    }

    fn task_progress(&self, task_id: curveflow::TaskId, percent: u32, message: &str) {
        println!("[progress] {task_id} {percent:>3}% {message}");
    }

    fn algorithm_failed(&self, algorithm: &str, reason: &str) {
        println!("[error] {algorithm}: {reason}");
    }

    fn show_message(&self, text: &str) {
        println!("[notice] {text}");
    }
}

fn sample_curve() -> Curve {
    let xs: Vec<f64> = (0..500).map(|i| i as f64 * 0.1).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|x| 1.0 + 0.02 * x + 8.0 * (-(x - 25.0).powi(2) / 4.0).exp() + 0.3 * (x * 7.3).sin())
        .collect();
    let mut curve = Curve::from_xy("C1", &xs, &ys);
    curve.name = "Chromatogram".to_string();
    curve
}

#[tokio::main]
async fn main() -> Result<()> {
    curveflow::init_tracing(Level::INFO);

    let config = EngineConfig::from_yaml_str(CONFIG)?;
    let curves = Arc::new(InMemoryCurves::new());
    curves.insert(sample_curve());
    curves.select("C1");

    let manager = curves.clone();
    let mut engine = Engine::builder()
        .with_config(config)
        .with_curves(curves.clone())
        .with_observer(Arc::new(LoggingObserver))
        .with_observer(Arc::new(ConsoleUi))
        .with_result_handler(
            ResultKind::Curve,
            Arc::new(move |result: &AlgorithmResult| {
                if let curveflow::ResultPayload::Curve { curve } = &result.payload {
                    info!(curve = %curve.id, parent = %result.parent_curve_id, "New curve");
                    manager.insert(curve.clone());
                }
            }),
        )
        .register(Arc::new(Smooth))?
        .register(Arc::new(Derivative))?
        .register(Arc::new(Baseline))?
        .register(Arc::new(PeakArea))?
        .build()?;

    for summary in engine.registry().describe_all() {
        println!("menu: {} ({:?})", summary.display_name, summary.interaction_kind);
    }

    // No interaction needed.
    engine.trigger("smooth");
    engine.trigger("derivative");
    engine.run_until_idle().await;

    // Point selection.
    engine.trigger("baseline");
    engine.submit_points(vec![Point::new(2.0, 1.05), Point::new(48.0, 1.95)]);
    engine.run_until_idle().await;

    // Dialog, then points.
    engine.trigger("peak_area");
    let mut params = Map::new();
    params.insert("method".to_string(), json!("trapezoid"));
    engine.submit_parameters("peak_area", params);
    engine.submit_points(vec![Point::new(20.0, 0.0), Point::new(30.0, 0.0)]);
    engine.run_until_idle().await;

    // Same bounds again without asking.
    engine.rerun_last("peak_area");
    engine.run_until_idle().await;

    let areas: Vec<AlgorithmResult> = engine.context().history_results("peak_area", "C1", 0);
    for area in &areas {
        println!("peak area: {:?}", area.payload);
    }
    println!("curves: {:?}", curves.ids());
    println!("stats: {:?}", engine.stats());

    engine.shutdown().await;
    Ok(())
}
