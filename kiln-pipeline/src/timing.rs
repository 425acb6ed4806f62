//! Rebuilding a timed tree from a plan and the ledger of its execution.
//!
//! The tree nests build → phase → plugin → pass → sub-steps. A new plugin
//! node starts whenever the owning plugin changes between consecutive
//! visible passes, so a plugin may appear more than once in a phase.

use std::time::Duration;

use kiln_core::serialize_option_duration_ms;
use serde::Serialize;

use crate::{BuildEvent, Ledger, PlannedPass, ResolvedPlan};

/// What a node of the timing tree stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Build,
    Phase,
    Plugin,
    Pass,
    Activation,
    Execution,
    Deactivation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingNode {
    pub label: String,
    pub kind: NodeKind,
    /// `None` when nothing below this node ran.
    #[serde(rename = "duration_ms", serialize_with = "serialize_option_duration_ms")]
    pub duration: Option<Duration>,
    pub failed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TimingNode>,
}

impl TimingNode {
    fn leaf(label: impl Into<String>, kind: NodeKind, duration: Option<Duration>) -> Self {
        Self {
            label: label.into(),
            kind,
            duration,
            failed: false,
            children: Vec::new(),
        }
    }

    fn group(label: impl Into<String>, kind: NodeKind, children: Vec<TimingNode>) -> Self {
        let duration = children
            .iter()
            .filter_map(|child| child.duration)
            .reduce(|a, b| a + b);
        let failed = children.iter().any(|child| child.failed);
        Self {
            label: label.into(),
            kind,
            duration,
            failed,
            children,
        }
    }

    /// Depth-first traversal yielding each node with its depth.
    pub fn walk(&self) -> Vec<(usize, &TimingNode)> {
        let mut nodes = Vec::new();
        self.collect(0, &mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, depth: usize, nodes: &mut Vec<(usize, &'a TimingNode)>) {
        nodes.push((depth, self));
        for child in &self.children {
            child.collect(depth + 1, nodes);
        }
    }
}

/// A build's timing tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimingTree {
    root: TimingNode,
}

impl TimingTree {
    /// Zip the plan's visible passes against the ledger's pass events.
    ///
    /// Events are matched by qualified name with a cursor that only moves
    /// forward; a pass without a matching event exhausts the cursor, so every
    /// later pass is shown without timings too.
    pub fn build(plan: &ResolvedPlan, ledger: &Ledger) -> Self {
        let mut cursor = Cursor {
            events: ledger.events(),
            position: 0,
        };

        let phases = plan
            .phases()
            .map(|(phase, passes)| {
                TimingNode::group(phase.name(), NodeKind::Phase, plugin_groups(passes, &mut cursor))
            })
            .collect();

        Self {
            root: TimingNode::group("Build", NodeKind::Build, phases),
        }
    }

    pub fn root(&self) -> &TimingNode {
        &self.root
    }

    pub fn phases(&self) -> &[TimingNode] {
        &self.root.children
    }

    pub fn total(&self) -> Option<Duration> {
        self.root.duration
    }
}

struct Cursor<'a> {
    events: &'a [BuildEvent],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn seek(&mut self, pass: &PlannedPass) -> Option<&'a BuildEvent> {
        let events = self.events;
        let found = events[self.position..]
            .iter()
            .position(|event| event.pass() == Some(&pass.qualified_name));
        match found {
            Some(offset) => {
                self.position += offset + 1;
                events.get(self.position - 1)
            }
            None => {
                self.position = events.len();
                None
            }
        }
    }
}

fn plugin_groups(passes: &[PlannedPass], cursor: &mut Cursor<'_>) -> Vec<TimingNode> {
    let mut runs: Vec<(&str, Vec<TimingNode>)> = Vec::new();

    for pass in passes.iter().filter(|pass| !pass.internal) {
        let node = pass_node(pass, cursor.seek(pass));
        match runs.last_mut() {
            Some((plugin, nodes)) if *plugin == pass.plugin.as_str() => nodes.push(node),
            _ => runs.push((pass.plugin.as_str(), vec![node])),
        }
    }

    runs.into_iter()
        .map(|(plugin, nodes)| TimingNode::group(plugin, NodeKind::Plugin, nodes))
        .collect()
}

fn pass_node(pass: &PlannedPass, event: Option<&BuildEvent>) -> TimingNode {
    let label = pass.qualified_name.as_str();
    let Some(timings) = event.and_then(BuildEvent::timings) else {
        return TimingNode::leaf(label, NodeKind::Pass, None);
    };

    let mut children = Vec::new();
    if timings.has_transitions() {
        for (context, elapsed) in &timings.activation {
            children.push(TimingNode::leaf(
                format!("Activate {}", context),
                NodeKind::Activation,
                Some(*elapsed),
            ));
        }
        if timings.execution.is_some() {
            children.push(TimingNode::leaf(
                "Pass execution",
                NodeKind::Execution,
                timings.execution,
            ));
        }
        for (context, elapsed) in &timings.deactivation {
            children.push(TimingNode::leaf(
                format!("Deactivate {}", context),
                NodeKind::Deactivation,
                Some(*elapsed),
            ));
        }
    }

    TimingNode {
        label: label.to_string(),
        kind: NodeKind::Pass,
        duration: Some(timings.total()),
        failed: matches!(event, Some(BuildEvent::PassFailed { .. })),
        children,
    }
}
