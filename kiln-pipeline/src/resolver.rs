//! Deterministic resolution of pass ordering constraints.
//!
//! Each phase is resolved independently: the passes declared for it form the
//! nodes of a constraint graph, before/after declarations form its edges, and
//! a stable topological sort picks ready passes in declaration order (plugin
//! registration order, then the plugin's own pass order).

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use kiln_core::{Phase, QualifiedName};
use tracing::{debug, warn};

use crate::{
    CycleError, Diagnostic, Plugin, ResolveError,
    pass::{Constraint, ConstraintTarget},
    plan::{PassLocation, PlannedPass, ResolvedPlan},
};

/// A successfully resolved plan plus the diagnostics found along the way.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub plan: ResolvedPlan,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Whether any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(|d| d.severity.is_warning())
    }
}

struct Declared<'p, T> {
    name: QualifiedName,
    plugin: QualifiedName,
    location: PassLocation,
    pass: &'p crate::Pass<T>,
}

/// Resolve the execution order of every pass contributed by `plugins`.
///
/// `phases` is normalized to canonical phase order with duplicates removed.
/// Passes declared for a phase outside that set are skipped with an info
/// diagnostic.
///
/// # Errors
///
/// - [`ResolveError::InvalidName`] for a malformed plugin or pass name.
/// - [`ResolveError::DuplicatePlugin`] / [`ResolveError::DuplicatePass`] for
///   name collisions.
/// - [`ResolveError::Cycles`] when at least one phase has cyclic constraints.
///   No partial plan is returned.
pub fn resolve<T>(phases: &[Phase], plugins: &[Plugin<T>]) -> Result<Resolution, ResolveError> {
    let phases: BTreeSet<Phase> = phases.iter().copied().collect();
    let declared = collect(plugins)?;
    let mut diagnostics = Vec::new();

    let plugin_names: HashSet<&str> = plugins.iter().map(Plugin::name).collect();
    let phase_of: HashMap<&str, Phase> = declared
        .iter()
        .map(|d| (d.name.as_str(), d.pass.phase()))
        .collect();

    for d in &declared {
        if !phases.contains(&d.pass.phase()) {
            diagnostics.push(
                Diagnostic::info(
                    "phase-not-scheduled",
                    format!(
                        "pass '{}' belongs to phase {}, which this pipeline does not run",
                        d.name,
                        d.pass.phase()
                    ),
                )
                .at(d.name.as_str()),
            );
        }
    }

    let mut resolved = IndexMap::new();
    let mut cycles = Vec::new();

    for phase in phases {
        let nodes: Vec<&Declared<'_, T>> = declared
            .iter()
            .filter(|d| d.pass.phase() == phase)
            .collect();
        let graph = Graph::build(phase, &nodes, &plugin_names, &phase_of, &mut diagnostics);

        match graph.stable_order() {
            Ok(order) => {
                debug!(phase = %phase, passes = order.len(), "resolved phase");
                let passes = order.into_iter().map(|i| planned(plugins, nodes[i])).collect();
                resolved.insert(phase, passes);
            }
            Err(cycle) => cycles.push(CycleError {
                phase,
                cycle: cycle.into_iter().map(|i| nodes[i].name.clone()).collect(),
            }),
        }
    }

    for diagnostic in diagnostics.iter().filter(|d| !d.severity.is_warning()) {
        debug!(%diagnostic, "resolution diagnostic");
    }

    if !cycles.is_empty() {
        return Err(ResolveError::Cycles { cycles, diagnostics });
    }

    Ok(Resolution {
        plan: ResolvedPlan::new(resolved),
        diagnostics,
    })
}

/// Validate names and flatten all passes in declaration order.
fn collect<T>(plugins: &[Plugin<T>]) -> Result<Vec<Declared<'_, T>>, ResolveError> {
    let mut seen_plugins = HashSet::new();
    let mut seen_passes: HashMap<QualifiedName, QualifiedName> = HashMap::new();
    let mut declared = Vec::new();

    for (plugin_index, plugin) in plugins.iter().enumerate() {
        let plugin_name = QualifiedName::new(plugin.name()).map_err(|e| ResolveError::InvalidName {
            kind: "plugin",
            name: e.name,
            reason: e.reason,
        })?;
        if !seen_plugins.insert(plugin_name.clone()) {
            return Err(ResolveError::DuplicatePlugin { name: plugin_name });
        }

        for (pass_index, pass) in plugin.passes().iter().enumerate() {
            let name = QualifiedName::new(pass.name()).map_err(|e| ResolveError::InvalidName {
                kind: "pass",
                name: e.name,
                reason: e.reason,
            })?;
            if let Some(first_plugin) = seen_passes.get(&name) {
                return Err(ResolveError::DuplicatePass {
                    name,
                    first_plugin: first_plugin.clone(),
                    second_plugin: plugin_name,
                });
            }
            seen_passes.insert(name.clone(), plugin_name.clone());

            declared.push(Declared {
                name,
                plugin: plugin_name.clone(),
                location: PassLocation {
                    plugin: plugin_index,
                    pass: pass_index,
                },
                pass,
            });
        }
    }

    Ok(declared)
}

fn planned<T>(plugins: &[Plugin<T>], declared: &Declared<'_, T>) -> PlannedPass {
    let plugin_description = plugins
        .get(declared.location.plugin)
        .map(|p| p.description().to_string())
        .unwrap_or_default();

    PlannedPass {
        qualified_name: declared.name.clone(),
        description: declared.pass.description().to_string(),
        plugin: declared.plugin.clone(),
        plugin_description,
        internal: declared.pass.is_internal(),
        requires: declared.pass.required_types(),
        compatible: declared.pass.compatible_types().to_vec(),
        location: declared.location,
    }
}

/// Constraint graph of one phase. Node indices are declaration order.
struct Graph {
    successors: Vec<BTreeSet<usize>>,
}

impl Graph {
    fn build<T>(
        phase: Phase,
        nodes: &[&Declared<'_, T>],
        plugin_names: &HashSet<&str>,
        phase_of: &HashMap<&str, Phase>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let by_name: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();
        let mut by_plugin: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, d) in nodes.iter().enumerate() {
            by_plugin.entry(d.plugin.as_str()).or_default().push(i);
        }

        let mut successors = vec![BTreeSet::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            for constraint in node.pass.constraints() {
                let targets: Vec<usize> = match constraint.target() {
                    ConstraintTarget::Pass(name) => match by_name.get(name.as_str()) {
                        Some(&j) => vec![j],
                        None => {
                            diagnostics.push(unresolved(phase, node, constraint, phase_of));
                            continue;
                        }
                    },
                    ConstraintTarget::Plugin(name) => match by_plugin.get(name.as_str()) {
                        Some(members) => members.clone(),
                        None if plugin_names.contains(name.as_str()) => continue,
                        None => {
                            diagnostics.push(unresolved(phase, node, constraint, phase_of));
                            continue;
                        }
                    },
                };

                for j in targets.into_iter().filter(|&j| j != i) {
                    match constraint {
                        Constraint::Before(_) => successors[i].insert(j),
                        Constraint::After(_) => successors[j].insert(i),
                    };
                }
            }
        }

        Self { successors }
    }

    /// Kahn's algorithm, always taking the lowest-indexed ready node.
    ///
    /// Returns the shortest cycle among the unscheduled nodes on failure.
    fn stable_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut in_degree = vec![0usize; self.successors.len()];
        for targets in &self.successors {
            for &j in targets {
                in_degree[j] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..in_degree.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &j in &self.successors[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if order.len() == in_degree.len() {
            return Ok(order);
        }

        let stuck: BTreeSet<usize> = (0..in_degree.len()).filter(|&i| in_degree[i] > 0).collect();
        Err(self.shortest_cycle(&stuck))
    }

    fn shortest_cycle(&self, stuck: &BTreeSet<usize>) -> Vec<usize> {
        let mut best: Option<Vec<usize>> = None;
        for &start in stuck {
            if let Some(cycle) = self.cycle_through(start, stuck) {
                if best.as_ref().is_none_or(|b| cycle.len() < b.len()) {
                    best = Some(cycle);
                }
            }
        }
        best.unwrap_or_else(|| stuck.iter().copied().collect())
    }

    /// Breadth-first search for the shortest path from `start` back to itself.
    fn cycle_through(&self, start: usize, within: &BTreeSet<usize>) -> Option<Vec<usize>> {
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for &next in &self.successors[node] {
                if !within.contains(&next) {
                    continue;
                }
                if next == start {
                    let mut cycle = vec![node];
                    let mut cursor = node;
                    while cursor != start {
                        cursor = parent[&cursor];
                        cycle.push(cursor);
                    }
                    cycle.reverse();
                    return Some(cycle);
                }
                if !parent.contains_key(&next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

fn unresolved<T>(
    phase: Phase,
    node: &Declared<'_, T>,
    constraint: &Constraint,
    phase_of: &HashMap<&str, Phase>,
) -> Diagnostic {
    let target = constraint.target();
    let other_phase = match target {
        ConstraintTarget::Pass(name) => phase_of.get(name.as_str()).copied(),
        ConstraintTarget::Plugin(_) => None,
    };

    match other_phase {
        Some(other) => Diagnostic::error(
            "cross-phase-constraint",
            format!(
                "pass '{}' in phase {} is constrained against {} in phase {}; phase order already decides this, constraint ignored",
                node.name, phase, target, other
            ),
        )
        .at(node.name.as_str()),
        None => {
            warn!(pass = %node.name, %target, "ignoring constraint on unknown target");
            Diagnostic::warning(
                "dangling-constraint",
                format!("pass '{}' is constrained against unknown {}", node.name, target),
            )
            .at(node.name.as_str())
        }
    }
}
