//! End-to-end interaction flows through the engine

mod common;

use common::*;
use curveflow::context::keys;
use curveflow::{
    AlgorithmResult, EngineConfig, ObservedEvent, ParameterDefinition, Point, PointRequest,
    ResultKind, ResultPayload,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_baseline_point_selection_end_to_end() {
    let mut h = harness(EngineConfig::default(), vec![Arc::new(Baseline)]);

    assert!(h.engine.trigger("baseline").is_none());
    assert_eq!(
        h.observer.take(),
        vec![ObservedEvent::PointsRequested(PointRequest {
            algorithm: "baseline".into(),
            curve_id: "C1".into(),
            required_points: 2,
            hint: "Pick the two baseline anchors".into(),
        })]
    );

    let task_id = h.engine.submit_points(points(2)).expect("dispatched");
    h.settle().await;

    let events = h.observer.events();
    let for_task = task_events(&events, task_id);
    let started = for_task
        .iter()
        .filter(|e| matches!(e, ObservedEvent::TaskStarted { .. }))
        .count();
    assert_eq!(started, 1);
    assert!(matches!(for_task.first(), Some(ObservedEvent::TaskStarted { .. })));

    let progress: Vec<u32> = for_task
        .iter()
        .filter_map(|e| match e {
            ObservedEvent::TaskProgress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    match for_task.last() {
        Some(ObservedEvent::TaskFinished { result, .. }) => {
            assert_eq!(result.parent_curve_id, "C1");
            assert_eq!(result.algorithm, "baseline");
            match &result.payload {
                ResultPayload::Curve { curve } => {
                    assert_eq!(curve.len(), 20);
                    assert_eq!(curve.parent_id.as_deref(), Some("C1"));
                }
                other => panic!("expected a curve, got {other:?}"),
            }
        }
        other => panic!("expected TaskFinished last, got {other:?}"),
    }

    assert!(events.contains(&ObservedEvent::AlgorithmSucceeded {
        algorithm: "baseline".into()
    }));
    let stored: Option<AlgorithmResult> = h.engine.context().latest_result("baseline", "C1");
    assert_eq!(stored.map(|r| r.parent_curve_id), Some("C1".to_string()));
}

#[tokio::test]
async fn test_smooth_runs_without_any_request() {
    let mut h = harness(EngineConfig::default(), vec![Arc::new(Smooth)]);

    let task_id = h.engine.trigger("smooth").expect("immediate dispatch");
    h.settle().await;

    let events = h.observer.events();
    assert!(!events.iter().any(|e| matches!(
        e,
        ObservedEvent::ParametersRequested(_) | ObservedEvent::PointsRequested(_)
    )));
    let for_task = task_events(&events, task_id);
    assert!(matches!(for_task.first(), Some(ObservedEvent::TaskStarted { .. })));
    match for_task.last() {
        Some(ObservedEvent::TaskFinished { result, .. }) => {
            assert_eq!(result.metadata.get("window"), Some(&json!(5)));
        }
        other => panic!("expected TaskFinished, got {other:?}"),
    }

    // The dispatch staged the parameter namespace and a last-run snapshot.
    let ctx = h.engine.context();
    assert_eq!(ctx.get::<u64>(&keys::param("window")), Some(5));
    assert_eq!(ctx.source_of(&keys::param("window")), Some("smooth"));
    let last = ctx.last_run("smooth").unwrap();
    assert_eq!(last.curve_id.as_deref(), Some("C1"));
    assert_eq!(last.parameters.get("window"), Some(&json!(5)));
}

#[tokio::test]
async fn test_preset_parameters_override_defaults() {
    let mut h = harness(EngineConfig::default(), vec![Arc::new(Smooth)]);

    let mut preset = Map::new();
    preset.insert("window".into(), json!(3));
    let task_id = h.engine.trigger_with("smooth", preset).unwrap();
    h.settle().await;

    let events = h.observer.events();
    match task_events(&events, task_id).last() {
        Some(ObservedEvent::TaskFinished { result, .. }) => {
            assert_eq!(result.metadata.get("window"), Some(&json!(3)))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_insufficient_points_never_dispatch() {
    let mut h = harness(EngineConfig::default(), vec![Arc::new(Baseline)]);

    h.engine.trigger("baseline");
    assert!(h.engine.submit_points(points(1)).is_none());
    assert!(h.engine.pending().is_none());
    assert!(h.engine.is_idle());

    let events = h.observer.events();
    let failed = failures(&events);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "baseline");
    assert!(failed[0].1.contains("needs 2 point(s), got 1"));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ObservedEvent::TaskStarted { .. })));
}

#[tokio::test]
async fn test_trigger_validation_failures() {
    let mut h = harness(EngineConfig::default(), vec![Arc::new(Smooth)]);

    assert!(h.engine.trigger("fft").is_none());
    h.curves.clear_selection();
    assert!(h.engine.trigger("smooth").is_none());

    let failed = failures(&h.observer.events());
    assert_eq!(failed.len(), 2);
    assert!(failed[0].1.contains("Unknown algorithm: fft"));
    assert!(failed[1].1.contains("no curve is selected"));
    assert_eq!(h.engine.stats().workers, 0);
}

#[tokio::test]
async fn test_superseding_trigger_notifies_and_replaces() {
    let mut h = harness(
        EngineConfig::default(),
        vec![Arc::new(Baseline), Arc::new(Smooth)],
    );

    h.engine.trigger("baseline");
    assert!(h.engine.pending().is_some());

    let task_id = h.engine.trigger("smooth").expect("smooth dispatches");
    assert!(h.engine.pending().is_none());
    h.settle().await;

    let events = h.observer.events();
    assert!(events.iter().any(|e| matches!(
        e,
        ObservedEvent::Message(msg) if msg.contains("Baseline") && msg.contains("smooth")
    )));
    assert!(matches!(
        task_events(&events, task_id).last(),
        Some(ObservedEvent::TaskFinished { .. })
    ));

    // The superseded request no longer accepts points.
    assert!(h.engine.submit_points(points(2)).is_none());
}

#[tokio::test]
async fn test_cancel_pending_request() {
    let mut h = harness(EngineConfig::default(), vec![Arc::new(Baseline)]);
    h.engine.trigger("baseline");
    h.observer.clear();

    h.engine.cancel_pending();
    h.engine.cancel_pending();
    assert_eq!(
        h.observer.events(),
        vec![ObservedEvent::Message("Baseline was cancelled".into())]
    );
}

#[tokio::test]
async fn test_parameter_dialog_round_trip() {
    struct Fit;
    impl curveflow::Algorithm for Fit {
        fn name(&self) -> &str {
            "fit"
        }
        fn describe_parameters(&self) -> Vec<ParameterDefinition> {
            vec![
                ParameterDefinition::new("order", "Polynomial order")
                    .required()
                    .with_constraint("min", 1)
                    .with_constraint("max", 9),
                ParameterDefinition::new("weighted", "Weighted").with_default(false),
            ]
        }
        fn execute_with_context(
            &self,
            context: &mut curveflow::Context,
            _reporter: &dyn curveflow::ProgressReporter,
        ) -> anyhow::Result<AlgorithmResult> {
            let order: u64 = context.get(&keys::param("order")).unwrap_or_default();
            Ok(AlgorithmResult::scalar(order as f64, None))
        }
    }

    let mut h = harness(EngineConfig::default(), vec![Arc::new(Fit)]);
    assert!(h.engine.trigger("fit").is_none());

    let events = h.observer.take();
    match events.as_slice() {
        [ObservedEvent::ParametersRequested(request)] => {
            assert_eq!(request.definitions.len(), 2);
            assert_eq!(request.initial_values.get("weighted"), Some(&json!(false)));
            assert!(request.initial_values.get("order").is_none());
        }
        other => panic!("expected a parameter request, got {other:?}"),
    }

    let mut submitted = Map::new();
    submitted.insert("order".into(), json!(3));
    let task_id = h.engine.submit_parameters("fit", submitted).unwrap();
    h.settle().await;

    let events = h.observer.events();
    match task_events(&events, task_id).last() {
        Some(ObservedEvent::TaskFinished { result, .. }) => {
            assert_eq!(
                result.payload,
                ResultPayload::Scalar {
                    value: 3.0,
                    unit: None
                }
            );
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_prerequisite_gates_trigger() {
    struct Area;
    impl curveflow::Algorithm for Area {
        fn name(&self) -> &str {
            "area"
        }
        fn prerequisites(&self) -> Vec<String> {
            vec!["peaks.detected".into()]
        }
        fn execute_with_context(
            &self,
            _context: &mut curveflow::Context,
            _reporter: &dyn curveflow::ProgressReporter,
        ) -> anyhow::Result<AlgorithmResult> {
            Ok(AlgorithmResult::scalar(12.5, Some("a.u.")))
        }
    }

    let mut h = harness(EngineConfig::default(), vec![Arc::new(Area)]);
    assert!(h.engine.trigger("area").is_none());
    assert!(failures(&h.observer.take())[0].1.contains("peaks.detected"));

    let peaks = vec![Point::new(4.0, 9.0)];
    h.engine
        .context_mut()
        .set_value("peaks.detected", &peaks, "peak-finder");
    assert!(h.engine.trigger("area").is_some());
    h.settle().await;
}

#[tokio::test]
async fn test_result_handlers_receive_by_kind() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();

    let curves = Arc::new(curveflow::InMemoryCurves::new());
    curves.insert(sample_curve());
    curves.select("C1");
    let mut engine = curveflow::Engine::builder()
        .with_curves(curves)
        .with_result_handler(
            ResultKind::Curve,
            Arc::new(move |result: &AlgorithmResult| {
                assert_eq!(result.parent_curve_id, "C1");
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .register(Arc::new(Smooth))
        .unwrap()
        .register(Arc::new(Slow::new("slow", 1)))
        .unwrap()
        .build()
        .unwrap();

    engine.trigger("smooth");
    engine.run_until_idle().await;
    engine.trigger("slow");
    engine.run_until_idle().await;

    // Only the curve result reached the curve handler.
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_prepare_context_rejection_creates_no_task() {
    struct NeedsLongCurve;
    impl curveflow::Algorithm for NeedsLongCurve {
        fn name(&self) -> &str {
            "fft"
        }
        fn prepare_context(&self, context: &curveflow::Context) -> bool {
            context
                .get::<curveflow::Curve>(keys::ACTIVE_CURVE)
                .is_some_and(|c| c.len() >= 64)
        }
        fn execute_with_context(
            &self,
            _context: &mut curveflow::Context,
            _reporter: &dyn curveflow::ProgressReporter,
        ) -> anyhow::Result<AlgorithmResult> {
            Ok(AlgorithmResult::empty())
        }
    }

    let mut h = harness(EngineConfig::default(), vec![Arc::new(NeedsLongCurve)]);
    assert!(h.engine.trigger("fft").is_none());

    let failed = failures(&h.observer.events());
    assert_eq!(failed.len(), 1);
    assert!(failed[0].1.contains("context not ready"));
    assert_eq!(h.engine.stats().workers, 0);
    assert!(h.engine.is_idle());
}
