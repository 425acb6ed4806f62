//! Property-based tests for ordering and determinism guarantees

use kiln_core::Phase;
use kiln_pipeline::{
    ContextPolicy, Pipeline, Plugin,
    testing::{AlphaContext, BetaContext, TestTarget, logging_pass, order},
};
use proptest::prelude::*;

const PHASE: Phase = Phase::Transforming;
const PLUGINS: usize = 3;

fn pass_name(i: usize) -> String {
    format!("p{}.s{}", i % PLUGINS, i)
}

/// Random acyclic constraint sets: node ranks plus candidate edges, each
/// oriented from lower to higher rank.
fn constraint_sets() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize, bool)>)> {
    (2usize..10).prop_flat_map(|n| {
        (
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            prop::collection::vec((0..n, 0..n, any::<bool>()), 0..20),
        )
    })
}

/// Edges as (earlier, later, declared_as_before) with self loops dropped.
fn oriented(ranks: &[usize], edges: &[(usize, usize, bool)]) -> Vec<(usize, usize, bool)> {
    edges
        .iter()
        .filter(|(a, b, _)| a != b)
        .map(|&(a, b, as_before)| {
            if ranks[a] < ranks[b] {
                (a, b, as_before)
            } else {
                (b, a, as_before)
            }
        })
        .collect()
}

fn build_plugins(n: usize, edges: &[(usize, usize, bool)]) -> Vec<Plugin<TestTarget>> {
    let declare = |i: usize| {
        edges
            .iter()
            .fold(logging_pass(&pass_name(i), PHASE), |pass, &(earlier, later, as_before)| {
                if as_before && earlier == i {
                    pass.before_pass(pass_name(later))
                } else if !as_before && later == i {
                    pass.after_pass(pass_name(earlier))
                } else {
                    pass
                }
            })
    };

    (0..PLUGINS)
        .map(|p| {
            (p..n)
                .step_by(PLUGINS)
                .map(&declare)
                .fold(Plugin::new(format!("p{}", p), "generated"), Plugin::pass)
        })
        .collect()
}

fn pipeline_of(plugins: Vec<Plugin<TestTarget>>) -> Pipeline<TestTarget> {
    plugins
        .into_iter()
        .fold(Pipeline::new().phases([PHASE]), Pipeline::plugin)
}

/// Every declared before/after relationship holds in the resolved order.
#[test]
fn test_constraints_hold_in_resolved_order() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&constraint_sets(), |(ranks, edges)| {
            let n = ranks.len();
            let edges = oriented(&ranks, &edges);
            let pipeline = pipeline_of(build_plugins(n, &edges));

            let resolution = pipeline.resolve().expect("acyclic constraints resolve");
            let resolved = order(&resolution.plan, PHASE);
            prop_assert_eq!(resolved.len(), n);

            let position = |i: usize| resolved.iter().position(|name| *name == pass_name(i));
            for &(earlier, later, _) in &edges {
                prop_assert!(position(earlier) < position(later));
            }
            Ok(())
        })
        .unwrap();
}

/// Resolving the same registrations twice yields identical plans.
#[test]
fn test_resolution_is_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&constraint_sets(), |(ranks, edges)| {
            let edges = oriented(&ranks, &edges);
            let first = pipeline_of(build_plugins(ranks.len(), &edges))
                .resolve()
                .expect("acyclic constraints resolve");
            let second = pipeline_of(build_plugins(ranks.len(), &edges))
                .resolve()
                .expect("acyclic constraints resolve");

            prop_assert_eq!(
                serde_json::to_string(&first.plan).unwrap(),
                serde_json::to_string(&second.plan).unwrap()
            );
            Ok(())
        })
        .unwrap();
}

fn requirement_pipeline(requirements: &[u8], policy: ContextPolicy) -> Pipeline<TestTarget> {
    let passes = requirements.iter().enumerate().map(|(i, bits)| {
        let pass = logging_pass(&format!("p.s{}", i), PHASE);
        let pass = if bits & 1 != 0 { pass.requires::<AlphaContext>() } else { pass };
        if bits & 2 != 0 { pass.requires::<BetaContext>() } else { pass }
    });
    let plugin = passes.fold(Plugin::new("p", "generated"), Plugin::pass);
    Pipeline::new().phases([PHASE]).context_policy(policy).plugin(plugin)
}

fn count(log: &[&str], entry: &str) -> usize {
    log.iter().filter(|line| **line == entry).count()
}

/// Both context policies run the same passes in the same order, balance every
/// activation with a deactivation, and lookahead never activates more often.
#[test]
fn test_context_policies_agree_on_execution() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(0u8..4, 1..12), |requirements| {
            let mut lookahead_target = TestTarget::new();
            let mut per_pass_target = TestTarget::new();
            let lookahead = requirement_pipeline(&requirements, ContextPolicy::Lookahead)
                .run(&mut lookahead_target)
                .expect("no constraints to resolve");
            let per_pass = requirement_pipeline(&requirements, ContextPolicy::PerPass)
                .run(&mut per_pass_target)
                .expect("no constraints to resolve");
            prop_assert!(lookahead.succeeded() && per_pass.succeeded());

            let lookahead_log = lookahead_target.entries();
            let per_pass_log = per_pass_target.entries();
            let runs = |log: &[&str]| -> Vec<String> {
                log.iter().filter(|l| l.starts_with("run ")).map(|l| l.to_string()).collect()
            };
            prop_assert_eq!(runs(&lookahead_log), runs(&per_pass_log));

            for context in ["Alpha", "Beta"] {
                let activate = format!("activate {}", context);
                let deactivate = format!("deactivate {}", context);
                for log in [&lookahead_log, &per_pass_log] {
                    prop_assert_eq!(count(log, &activate), count(log, &deactivate));
                }
                prop_assert!(count(&lookahead_log, &activate) <= count(&per_pass_log, &activate));
            }
            Ok(())
        })
        .unwrap();
}
