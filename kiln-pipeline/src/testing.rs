//! Helpers for testing pipelines and extension contexts.
//!
//! Enabled under `cfg(test)` and with the `testing` feature.

use eyre::{Result, bail};
use kiln_core::Phase;

use crate::{BuildEvent, ExtensionContext, Ledger, Pass, Plugin, ResolvedPlan};

/// A build target that records what happened to it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub log: Vec<String>,
}

impl TestTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<&str> {
        self.log.iter().map(String::as_str).collect()
    }

    pub fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

macro_rules! recording_context {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name {
            activations: usize,
        }

        impl $name {
            /// Number of times this instance was activated.
            pub fn activations(&self) -> usize {
                self.activations
            }
        }

        impl ExtensionContext<TestTarget> for $name {
            fn activate(&mut self, target: &mut TestTarget) -> Result<()> {
                self.activations += 1;
                target.log.push(concat!("activate ", $label).to_string());
                Ok(())
            }

            fn deactivate(&mut self, target: &mut TestTarget) -> Result<()> {
                target.log.push(concat!("deactivate ", $label).to_string());
                Ok(())
            }
        }
    };
}

recording_context!(
    /// Logs `activate Alpha` / `deactivate Alpha` into the target.
    AlphaContext,
    "Alpha"
);
recording_context!(
    /// Logs `activate Beta` / `deactivate Beta` into the target.
    BetaContext,
    "Beta"
);
recording_context!(
    /// Logs `activate Gamma` / `deactivate Gamma` into the target.
    GammaContext,
    "Gamma"
);

/// A context whose activation always fails.
#[derive(Debug, Default)]
pub struct FailingContext;

impl ExtensionContext<TestTarget> for FailingContext {
    fn activate(&mut self, _target: &mut TestTarget) -> Result<()> {
        bail!("index unavailable")
    }
}

/// A context whose deactivation always fails.
#[derive(Debug, Default)]
pub struct FailingDeactivation;

impl ExtensionContext<TestTarget> for FailingDeactivation {
    fn deactivate(&mut self, target: &mut TestTarget) -> Result<()> {
        target.log.push("deactivate FailingDeactivation".to_string());
        bail!("write-back rejected")
    }
}

/// A pass that logs `run <name>` into the target.
pub fn logging_pass(name: &str, phase: Phase) -> Pass<TestTarget> {
    let label = format!("run {}", name);
    Pass::<TestTarget>::new(name, phase, move |cx| {
        cx.target_mut().log.push(label.clone());
        Ok(())
    })
}

/// A pass whose body returns an error.
pub fn failing_pass(name: &str, phase: Phase) -> Pass<TestTarget> {
    Pass::<TestTarget>::new(name, phase, |cx| {
        let entry = format!("fail {}", cx.pass_name());
        cx.target_mut().log.push(entry);
        bail!("pass body failed")
    })
}

/// A pass whose body panics.
pub fn panicking_pass(name: &str, phase: Phase) -> Pass<TestTarget> {
    Pass::new(name, phase, |_| panic!("pass body panicked"))
}

/// A plugin contributing the given passes.
pub fn plugin(name: &str, passes: impl IntoIterator<Item = Pass<TestTarget>>) -> Plugin<TestTarget> {
    passes
        .into_iter()
        .fold(Plugin::new(name, format!("{} test plugin", name)), Plugin::pass)
}

/// Qualified pass names of one phase, in resolved order.
pub fn order(plan: &ResolvedPlan, phase: Phase) -> Vec<String> {
    plan.passes(phase)
        .iter()
        .map(|pass| pass.qualified_name.to_string())
        .collect()
}

/// One short line per ledger event, e.g. `executed a.x` or `phase Transforming`.
pub fn event_names(ledger: &Ledger) -> Vec<String> {
    ledger.iter().map(describe_event).collect()
}

fn describe_event(event: &BuildEvent) -> String {
    match event {
        BuildEvent::BuildStarted => "build started".to_string(),
        BuildEvent::PhaseStarted { phase } => format!("phase {}", phase.name()),
        BuildEvent::PassExecuted { qualified_name, .. } => format!("executed {}", qualified_name),
        BuildEvent::PassFailed { qualified_name, .. } => format!("failed {}", qualified_name),
        BuildEvent::PhaseFinished { phase, status } => {
            format!("phase {} {}", phase.name(), status)
        }
        BuildEvent::BuildEnded { succeeded } => format!("build ended succeeded={}", succeeded),
    }
}
