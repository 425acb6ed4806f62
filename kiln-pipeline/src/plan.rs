//! The resolved execution plan.

use indexmap::IndexMap;
use kiln_core::{ContextType, Phase, QualifiedName};
use serde::Serialize;

/// Index of a pass inside the pipeline that resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PassLocation {
    pub plugin: usize,
    pub pass: usize,
}

/// One scheduled pass with the metadata reporting needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPass {
    pub qualified_name: QualifiedName,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub plugin: QualifiedName,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plugin_description: String,
    /// Scheduled and executed, but hidden from user-facing listings.
    pub internal: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<ContextType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compatible: Vec<ContextType>,
    #[serde(skip)]
    pub(crate) location: PassLocation,
}

/// Phase → ordered passes. The only artifact the resolver produces.
///
/// Every requested phase has an entry, possibly empty, in canonical phase
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedPlan {
    phases: IndexMap<Phase, Vec<PlannedPass>>,
}

impl ResolvedPlan {
    pub(crate) fn new(phases: IndexMap<Phase, Vec<PlannedPass>>) -> Self {
        Self { phases }
    }

    /// Phases in execution order with their passes.
    pub fn phases(&self) -> impl Iterator<Item = (Phase, &[PlannedPass])> + '_ {
        self.phases
            .iter()
            .map(|(phase, passes)| (*phase, passes.as_slice()))
    }

    /// All passes of a phase in execution order, internal ones included.
    pub fn passes(&self, phase: Phase) -> &[PlannedPass] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Passes of a phase that user-facing listings should show.
    pub fn visible(&self, phase: Phase) -> impl Iterator<Item = &PlannedPass> + '_ {
        self.passes(phase).iter().filter(|pass| !pass.internal)
    }

    /// Qualified names of a phase's passes, in order.
    pub fn order(&self, phase: Phase) -> Vec<&str> {
        self.passes(phase)
            .iter()
            .map(|pass| pass.qualified_name.as_str())
            .collect()
    }

    /// Look a pass up by qualified name.
    pub fn get(&self, name: &str) -> Option<(Phase, &PlannedPass)> {
        self.phases.iter().find_map(|(phase, passes)| {
            passes
                .iter()
                .find(|pass| pass.qualified_name == name)
                .map(|pass| (*phase, pass))
        })
    }

    /// Total number of scheduled passes.
    pub fn len(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
