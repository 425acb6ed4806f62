//! Context lifecycle planning.
//!
//! Decides, for each pass of a phase, which extension contexts to activate
//! before it and which to deactivate after it. The registry's reference
//! counting is what makes a context shared; this module only decides how long
//! the engine itself holds each context.

use indexmap::IndexSet;
use kiln_core::ContextType;
use serde::Serialize;

use crate::{ContextPolicy, PlannedPass};

/// Context changes around one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Contexts to activate right before the pass, in activation order.
    pub activate: Vec<ContextType>,
    /// Contexts to deactivate right after the pass, in deactivation order.
    pub deactivate: Vec<ContextType>,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.activate.is_empty() && self.deactivate.is_empty()
    }
}

/// Plan context transitions for a phase's passes, one per pass.
///
/// Every context is deactivated by the end of the phase. Contexts are
/// deactivated in reverse activation order.
pub fn plan_transitions(passes: &[PlannedPass], policy: ContextPolicy) -> Vec<Transition> {
    let mut active: IndexSet<ContextType> = IndexSet::new();
    let mut transitions = Vec::with_capacity(passes.len());

    for (i, pass) in passes.iter().enumerate() {
        let mut transition = Transition::default();

        for &context in &pass.requires {
            if active.insert(context) {
                transition.activate.push(context);
            }
        }

        for &context in active.iter().rev() {
            let keep = match policy {
                ContextPolicy::Lookahead => needed_later(&passes[i + 1..], context),
                ContextPolicy::PerPass => false,
            };
            if !keep {
                transition.deactivate.push(context);
            }
        }
        for context in &transition.deactivate {
            active.shift_remove(context);
        }

        transitions.push(transition);
    }

    transitions
}

/// Whether a later pass requires `context` with every pass in between
/// requiring or tolerating it.
fn needed_later(rest: &[PlannedPass], context: ContextType) -> bool {
    for pass in rest {
        if pass.requires.contains(&context) {
            return true;
        }
        if !pass.compatible.contains(&context) {
            return false;
        }
    }
    false
}
