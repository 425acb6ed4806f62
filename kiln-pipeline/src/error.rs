//! Structured errors for resolution and execution.

use kiln_core::{ContextType, Phase, QualifiedName};
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::Diagnostic;

/// Opaque failure carried out of plugin code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Render an error and all of its sources as `outer: inner: root`.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Ordering constraints within one phase that admit no valid order.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
#[error("cyclic ordering constraints in phase {phase}: {}", display_cycle(.cycle))]
#[diagnostic(
    code(kiln::resolve::cycle),
    help("remove one of the before/after constraints between these passes")
)]
pub struct CycleError {
    pub phase: Phase,
    /// The passes on a shortest cycle, in edge order.
    pub cycle: Vec<QualifiedName>,
}

fn display_cycle(cycle: &[QualifiedName]) -> String {
    let mut names: Vec<&str> = cycle.iter().map(QualifiedName::as_str).collect();
    if let Some(first) = names.first().copied() {
        names.push(first);
    }
    names.join(" -> ")
}

/// Errors that prevent a plan from being produced.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ResolveError {
    #[error("ordering constraints could not be satisfied in {} phase(s)", .cycles.len())]
    #[diagnostic(code(kiln::resolve::unsatisfiable))]
    Cycles {
        #[related]
        cycles: Vec<CycleError>,
        /// Diagnostics gathered before the cycles were found.
        diagnostics: Vec<Diagnostic>,
    },

    #[error("pass '{name}' is declared by both '{first_plugin}' and '{second_plugin}'")]
    #[diagnostic(
        code(kiln::resolve::duplicate_pass),
        help("qualified pass names must be unique across all plugins")
    )]
    DuplicatePass {
        name: QualifiedName,
        first_plugin: QualifiedName,
        second_plugin: QualifiedName,
    },

    #[error("plugin '{name}' is registered more than once")]
    #[diagnostic(code(kiln::resolve::duplicate_plugin))]
    DuplicatePlugin { name: QualifiedName },

    #[error("invalid {kind} name '{name}': {reason}")]
    #[diagnostic(
        code(kiln::resolve::invalid_name),
        help("use dotted identifiers without whitespace, e.g. 'vendor.plugin.pass'")
    )]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
}

/// Errors raised by the extension context registry.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ContextError {
    #[error("extension context {context} failed to activate")]
    #[diagnostic(code(kiln::context::activation))]
    Activation {
        context: ContextType,
        #[source]
        source: BoxError,
    },

    #[error("extension context {context} failed to deactivate")]
    #[diagnostic(code(kiln::context::deactivation))]
    Deactivation {
        context: ContextType,
        #[source]
        source: BoxError,
    },

    #[error("extension context {context} is not active")]
    #[diagnostic(code(kiln::context::not_active))]
    NotActive { context: ContextType },
}

impl ContextError {
    pub fn context(&self) -> ContextType {
        match self {
            ContextError::Activation { context, .. }
            | ContextError::Deactivation { context, .. }
            | ContextError::NotActive { context } => *context,
        }
    }
}

/// A build-fatal failure raised while executing a plan.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error("pass '{pass}' from plugin '{plugin}' failed")]
    #[diagnostic(
        code(kiln::build::pass_failed),
        help("the rest of this phase and all later phases were skipped")
    )]
    PassFailed {
        pass: QualifiedName,
        plugin: QualifiedName,
        #[source]
        source: BoxError,
    },

    #[error("could not activate {context} for pass '{pass}' from plugin '{plugin}'")]
    #[diagnostic(code(kiln::build::context_activation))]
    ContextActivation {
        context: ContextType,
        pass: QualifiedName,
        plugin: QualifiedName,
        #[source]
        source: ContextError,
    },

    #[error("could not deactivate {context} after pass '{pass}' from plugin '{plugin}'")]
    #[diagnostic(code(kiln::build::context_deactivation))]
    ContextDeactivation {
        context: ContextType,
        pass: QualifiedName,
        plugin: QualifiedName,
        #[source]
        source: ContextError,
    },

    #[error("pass '{pass}' is not registered with this pipeline")]
    #[diagnostic(
        code(kiln::build::stale_plan),
        help("resolve the plan again after changing the registered plugins")
    )]
    StalePlan { pass: QualifiedName },
}

impl BuildError {
    /// The pass the failure is attributed to.
    pub fn pass(&self) -> &QualifiedName {
        match self {
            BuildError::PassFailed { pass, .. }
            | BuildError::ContextActivation { pass, .. }
            | BuildError::ContextDeactivation { pass, .. }
            | BuildError::StalePlan { pass } => pass,
        }
    }

    /// The plugin owning the failing pass, when known.
    pub fn plugin(&self) -> Option<&QualifiedName> {
        match self {
            BuildError::PassFailed { plugin, .. }
            | BuildError::ContextActivation { plugin, .. }
            | BuildError::ContextDeactivation { plugin, .. } => Some(plugin),
            BuildError::StalePlan { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> QualifiedName {
        QualifiedName::new(s).unwrap()
    }

    #[test]
    fn test_cycle_display_closes_loop() {
        let err = CycleError {
            phase: Phase::Transforming,
            cycle: vec![name("a"), name("b")],
        };
        assert_eq!(
            err.to_string(),
            "cyclic ordering constraints in phase Transforming: a -> b -> a"
        );
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = BuildError::PassFailed {
            pass: name("demo.pass"),
            plugin: name("demo"),
            source: eyre::eyre!("mesh has no vertices").into(),
        };
        assert_eq!(
            error_chain(&err),
            "pass 'demo.pass' from plugin 'demo' failed: mesh has no vertices"
        );
        assert_eq!(err.plugin(), Some(&name("demo")));
    }
}
