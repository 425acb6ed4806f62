//! End-to-end scenarios: resolve a plugin set, execute it, inspect the ledger.

use kiln_core::{ContextType, Phase};
use kiln_pipeline::{
    BuildError, BuildEvent, ContextPolicy, Pass, PhaseStatus, Pipeline, ResolveError, Severity,
    testing::{AlphaContext, BetaContext, TestTarget, event_names, failing_pass, logging_pass, order, plugin},
};

const TRANSFORM: Phase = Phase::Transforming;

fn alpha() -> ContextType {
    ContextType::of::<AlphaContext>()
}

#[test]
fn test_after_constraint_across_plugins() {
    let mut pipeline = Pipeline::new()
        .plugin(plugin("plugin1", [logging_pass("plugin1.A", TRANSFORM)]))
        .plugin(plugin(
            "plugin2",
            [logging_pass("plugin2.B", TRANSFORM).after_pass("plugin1.A")],
        ));

    let resolution = pipeline.resolve().unwrap();
    assert_eq!(order(&resolution.plan, TRANSFORM), ["plugin1.A", "plugin2.B"]);

    let mut target = TestTarget::new();
    let report = pipeline.execute(&resolution.plan, &mut target);
    assert!(report.succeeded());

    let executed: Vec<&str> = report
        .ledger
        .executed()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(executed, ["plugin1.A", "plugin2.B"]);
    assert_eq!(target.entries(), ["run plugin1.A", "run plugin2.B"]);
}

#[test]
fn test_adjacent_passes_share_one_activation() {
    let mut pipeline = Pipeline::new()
        .plugin(plugin(
            "plugin1",
            [logging_pass("plugin1.X", TRANSFORM).requires::<AlphaContext>()],
        ))
        .plugin(plugin(
            "plugin2",
            [logging_pass("plugin2.Y", TRANSFORM).requires::<AlphaContext>()],
        ));

    let mut target = TestTarget::new();
    let report = pipeline.run(&mut target).unwrap();
    assert!(report.succeeded());

    let timings: Vec<_> = report.ledger.executed().collect();
    let (x, x_timings) = timings[0];
    let (y, y_timings) = timings[1];
    assert_eq!(x, "plugin1.X");
    assert_eq!(y, "plugin2.Y");

    assert_eq!(x_timings.activation.keys().copied().collect::<Vec<_>>(), [alpha()]);
    assert!(x_timings.deactivation.is_empty());
    assert!(y_timings.activation.is_empty());
    assert_eq!(y_timings.deactivation.keys().copied().collect::<Vec<_>>(), [alpha()]);

    assert_eq!(
        target.entries(),
        ["activate Alpha", "run plugin1.X", "run plugin2.Y", "deactivate Alpha"]
    );
}

#[test]
fn test_per_pass_policy_reactivates_but_keeps_order() {
    let mut pipeline = Pipeline::new()
        .context_policy(ContextPolicy::PerPass)
        .plugin(plugin(
            "plugin1",
            [
                logging_pass("plugin1.X", TRANSFORM).requires::<AlphaContext>(),
                logging_pass("plugin1.Y", TRANSFORM).requires::<AlphaContext>(),
            ],
        ));

    let mut target = TestTarget::new();
    let report = pipeline.run(&mut target).unwrap();
    assert!(report.succeeded());
    assert_eq!(
        target.entries(),
        [
            "activate Alpha",
            "run plugin1.X",
            "deactivate Alpha",
            "activate Alpha",
            "run plugin1.Y",
            "deactivate Alpha",
        ]
    );
    for (_, timings) in report.ledger.executed() {
        assert!(timings.activation.contains_key(&alpha()));
        assert!(timings.deactivation.contains_key(&alpha()));
    }
}

#[test]
fn test_failure_aborts_phase_and_later_phases() {
    let mut pipeline = Pipeline::new()
        .plugin(plugin(
            "early",
            [logging_pass("early.resolve", Phase::Resolving)],
        ))
        .plugin(plugin(
            "broken",
            [
                logging_pass("broken.before", TRANSFORM),
                failing_pass("broken.fail", TRANSFORM),
                logging_pass("broken.after", TRANSFORM),
                logging_pass("broken.optimize", Phase::Optimizing),
            ],
        ));

    let mut target = TestTarget::new();
    let report = pipeline.run(&mut target).unwrap();

    let Err(BuildError::PassFailed { pass, plugin: owner, source }) = &report.outcome else {
        panic!("expected a pass failure, got {:?}", report.outcome);
    };
    assert_eq!(pass, "broken.fail");
    assert_eq!(owner, "broken");
    assert_eq!(source.to_string(), "pass body failed");

    assert_eq!(
        event_names(&report.ledger),
        [
            "build started",
            "phase Resolving",
            "executed early.resolve",
            "phase Resolving completed",
            "phase Generating",
            "phase Generating completed",
            "phase Transforming",
            "executed broken.before",
            "failed broken.fail",
            "phase Transforming failed",
            "build ended succeeded=false",
        ]
    );
    assert_eq!(report.phases[&Phase::Resolving], PhaseStatus::Completed);
    assert_eq!(report.phases[&TRANSFORM], PhaseStatus::Failed);
    assert_eq!(report.phases[&Phase::Optimizing], PhaseStatus::NotStarted);
    assert!(!target.entries().contains(&"run broken.after"));
}

#[test]
fn test_contexts_released_when_pass_fails() {
    let mut pipeline = Pipeline::new().plugin(plugin(
        "p",
        [
            logging_pass("p.a", TRANSFORM)
                .requires::<AlphaContext>()
                .requires::<BetaContext>(),
            failing_pass("p.b", TRANSFORM).requires::<AlphaContext>(),
            logging_pass("p.c", TRANSFORM).requires::<AlphaContext>(),
        ],
    ));

    let mut target = TestTarget::new();
    let report = pipeline.run(&mut target).unwrap();
    assert!(!report.succeeded());
    assert_eq!(
        target.entries(),
        [
            "activate Alpha",
            "activate Beta",
            "run p.a",
            "deactivate Beta",
            "fail p.b",
            "deactivate Alpha",
        ]
    );

    let Some(BuildEvent::PassFailed { qualified_name, timings, .. }) = report.ledger.failure() else {
        panic!("expected a failure event");
    };
    assert_eq!(qualified_name, "p.b");
    assert!(timings.execution.is_some());
    assert!(timings.deactivation.contains_key(&alpha()));
}

#[test]
fn test_cycle_yields_no_plan() {
    let pipeline = Pipeline::new()
        .plugin(plugin("p1", [logging_pass("p1.A", TRANSFORM).before_pass("p2.B")]))
        .plugin(plugin("p2", [logging_pass("p2.B", TRANSFORM).before_pass("p1.A")]));

    let err = pipeline.resolve().unwrap_err();
    let ResolveError::Cycles { cycles, .. } = &err else {
        panic!("expected cycles, got {err}");
    };
    let names: Vec<&str> = cycles[0].cycle.iter().map(|n| n.as_str()).collect();
    assert!(names.contains(&"p1.A"));
    assert!(names.contains(&"p2.B"));
}

#[test]
fn test_dangling_constraint_is_a_warning() {
    let mut pipeline = Pipeline::new().plugin(plugin(
        "p",
        [
            logging_pass("p.a", TRANSFORM).before_pass("gone.x"),
            logging_pass("p.b", TRANSFORM).after_plugin("gone"),
        ],
    ));

    let resolution = pipeline.resolve().unwrap();
    assert_eq!(resolution.diagnostics.len(), 2);
    assert!(
        resolution
            .diagnostics
            .iter()
            .all(|d| d.severity == Severity::Warning)
    );

    let report = pipeline.execute(&resolution.plan, &mut TestTarget::new());
    assert!(report.succeeded());
}

#[test]
fn test_internal_pass_runs_but_is_hidden() {
    let mut pipeline = Pipeline::new().plugin(plugin(
        "p",
        [
            Pass::<TestTarget>::new("p.prepare", TRANSFORM, |cx| {
                cx.target_mut().log.push("prepare".into());
                Ok(())
            })
            .internal(),
            logging_pass("p.visible", TRANSFORM),
        ],
    ));

    let resolution = pipeline.resolve().unwrap();
    assert_eq!(resolution.plan.visible(TRANSFORM).count(), 1);

    let mut target = TestTarget::new();
    let report = pipeline.execute(&resolution.plan, &mut target);
    assert_eq!(target.entries(), ["prepare", "run p.visible"]);
    assert_eq!(report.ledger.executed().count(), 2);
}

#[test]
fn test_ledger_serializes_as_event_list() {
    let mut pipeline = Pipeline::new()
        .phases([TRANSFORM])
        .plugin(plugin("p", [logging_pass("p.a", TRANSFORM)]));
    let report = pipeline.run(&mut TestTarget::new()).unwrap();

    let json = serde_json::to_value(&report.ledger).unwrap();
    let events = json.as_array().unwrap();
    assert_eq!(events[0]["event"], "build_started");
    assert_eq!(events[2]["event"], "pass_executed");
    assert_eq!(events[2]["qualified_name"], "p.a");
    assert!(events[2]["execution_ms"].is_f64());
    assert_eq!(events.last().unwrap()["succeeded"], true);
}
