//! Build command report.

use kiln_core::format_millis;
use kiln_pipeline::{BuildEvent, ContextPolicy, TimingNode};

use super::output::{Output, Report};

/// Timing tree and outcome of a demo build.
#[derive(Debug)]
pub struct BuildSummary {
    pub tree: TimingNode,
    pub policy: ContextPolicy,
    /// One line per ledger event, when requested.
    pub events: Option<Vec<String>>,
    /// `pass (plugin): cause` of the failing pass.
    pub failure: Option<String>,
}

impl Report for BuildSummary {
    fn render(&self, out: &mut dyn Output) {
        out.title("Build timings");
        for (depth, node) in self.tree.walk() {
            out.tree_line(depth, &node_line(node));
        }

        if let Some(events) = &self.events {
            out.newline();
            out.section("Events");
            for (i, event) in events.iter().enumerate() {
                out.numbered_item(i + 1, event);
            }
        }

        out.newline();
        out.key_value("context policy", &self.policy.to_string());
        match &self.failure {
            None => out.preformatted("✓ build succeeded"),
            Some(failure) => out.warning(&format!("✗ build failed in {}", failure)),
        }
    }
}

fn node_line(node: &TimingNode) -> String {
    let duration = node.duration.map_or_else(|| "-".to_string(), format_millis);
    let mut line = format!("{}  {}", node.label, duration);
    if node.failed {
        line.push_str("  FAILED");
    }
    line
}

/// Human-readable one-line form of a ledger event.
pub fn describe_event(event: &BuildEvent) -> String {
    match event {
        BuildEvent::BuildStarted => "build started".to_string(),
        BuildEvent::PhaseStarted { phase } => format!("phase {} started", phase),
        BuildEvent::PassExecuted {
            qualified_name,
            timings,
            ..
        } => {
            let mut line = format!(
                "{} executed in {}",
                qualified_name,
                format_millis(timings.execution.unwrap_or_default())
            );
            for (context, elapsed) in &timings.activation {
                line.push_str(&format!(", activated {} in {}", context, format_millis(*elapsed)));
            }
            for (context, elapsed) in &timings.deactivation {
                line.push_str(&format!(", deactivated {} in {}", context, format_millis(*elapsed)));
            }
            line
        }
        BuildEvent::PassFailed {
            qualified_name,
            error,
            ..
        } => format!("{} failed: {}", qualified_name, error),
        BuildEvent::PhaseFinished { phase, status } => format!("phase {} {}", phase, status),
        BuildEvent::BuildEnded { succeeded: true } => "build ended, succeeded".to_string(),
        BuildEvent::BuildEnded { succeeded: false } => "build ended, failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kiln_pipeline::NodeKind;

    use super::*;
    use crate::reports::output::render_to_string;

    fn node(label: &str, kind: NodeKind, micros: Option<u64>, children: Vec<TimingNode>) -> TimingNode {
        TimingNode {
            label: label.to_string(),
            kind,
            duration: micros.map(Duration::from_micros),
            failed: false,
            children,
        }
    }

    #[test]
    fn test_failed_build_summary() {
        let mut failing = node("demo.merge.batch-groups", NodeKind::Pass, Some(250), Vec::new());
        failing.failed = true;

        let prefix = node(
            "demo.rename.prefix-meshes",
            NodeKind::Pass,
            Some(1500),
            vec![
                node("Activate RenameTracker", NodeKind::Activation, Some(500), Vec::new()),
                node("Pass execution", NodeKind::Execution, Some(1000), Vec::new()),
            ],
        );
        let transforming = node(
            "Transforming",
            NodeKind::Phase,
            Some(1750),
            vec![
                node("demo.rename", NodeKind::Plugin, Some(1500), vec![prefix]),
                node("demo.merge", NodeKind::Plugin, Some(250), vec![failing]),
            ],
        );
        let optimizing = node("Optimizing", NodeKind::Phase, None, Vec::new());

        let mut tree = node(
            "Build",
            NodeKind::Build,
            Some(1750),
            vec![transforming, optimizing],
        );
        tree.failed = true;

        let report = BuildSummary {
            tree,
            policy: ContextPolicy::Lookahead,
            events: None,
            failure: Some("demo.merge.batch-groups (demo.merge): injected failure".to_string()),
        };

        insta::assert_snapshot!(render_to_string(&report), @r"
Build timings
=============
Build  1.75ms  FAILED
  Transforming  1.75ms
    demo.rename  1.50ms
      demo.rename.prefix-meshes  1.50ms
        Activate RenameTracker  0.50ms
        Pass execution  1.00ms
    demo.merge  0.25ms
      demo.merge.batch-groups  0.25ms  FAILED
  Optimizing  -

context policy: lookahead
✗ build failed in demo.merge.batch-groups (demo.merge): injected failure
");
    }

    #[test]
    fn test_describe_events() {
        let lines: Vec<String> = [
            BuildEvent::BuildStarted,
            BuildEvent::PhaseStarted {
                phase: kiln_core::Phase::Resolving,
            },
            BuildEvent::BuildEnded { succeeded: false },
        ]
        .iter()
        .map(describe_event)
        .collect();
        assert_eq!(
            lines,
            ["build started", "phase Resolving started", "build ended, failed"]
        );
    }
}
