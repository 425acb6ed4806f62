//! The per-build event ledger.

use std::{fmt, time::Duration};

use indexmap::IndexMap;
use kiln_core::{
    ContextType, Phase, QualifiedName, as_millis, serialize_option_duration_ms,
};
use serde::{Serialize, Serializer};

/// Callback fired synchronously as each event is appended.
pub type BuildEventListener = Box<dyn Fn(&BuildEvent)>;

/// Where a phase is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Failed)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseStatus::NotStarted => "not started",
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
        })
    }
}

/// Time spent on one pass and on the context transitions attributed to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassTimings {
    /// Body execution time; `None` when the body never ran.
    #[serde(rename = "execution_ms", serialize_with = "serialize_option_duration_ms")]
    pub execution: Option<Duration>,
    /// Activations triggered right before the pass, in activation order.
    #[serde(rename = "activation_ms", serialize_with = "serialize_context_ms")]
    pub activation: IndexMap<ContextType, Duration>,
    /// Deactivations performed right after the pass, in deactivation order.
    #[serde(rename = "deactivation_ms", serialize_with = "serialize_context_ms")]
    pub deactivation: IndexMap<ContextType, Duration>,
}

impl PassTimings {
    /// Body time plus every attributed activation and deactivation.
    pub fn total(&self) -> Duration {
        self.execution.unwrap_or_default()
            + self.activation.values().sum::<Duration>()
            + self.deactivation.values().sum::<Duration>()
    }

    pub fn has_transitions(&self) -> bool {
        !self.activation.is_empty() || !self.deactivation.is_empty()
    }
}

fn serialize_context_ms<S>(
    times: &IndexMap<ContextType, Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(times.iter().map(|(context, d)| (context, as_millis(*d))))
}

/// One entry in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
    BuildStarted,
    PhaseStarted {
        phase: Phase,
    },
    PassExecuted {
        qualified_name: QualifiedName,
        plugin: QualifiedName,
        #[serde(flatten)]
        timings: PassTimings,
    },
    /// The pass, or a context transition attributed to it, failed.
    PassFailed {
        qualified_name: QualifiedName,
        plugin: QualifiedName,
        error: String,
        #[serde(flatten)]
        timings: PassTimings,
    },
    PhaseFinished {
        phase: Phase,
        status: PhaseStatus,
    },
    /// Always the last event of a build.
    BuildEnded {
        succeeded: bool,
    },
}

impl BuildEvent {
    /// The pass this event is about, if any.
    pub fn pass(&self) -> Option<&QualifiedName> {
        match self {
            BuildEvent::PassExecuted { qualified_name, .. }
            | BuildEvent::PassFailed { qualified_name, .. } => Some(qualified_name),
            _ => None,
        }
    }

    pub fn timings(&self) -> Option<&PassTimings> {
        match self {
            BuildEvent::PassExecuted { timings, .. } | BuildEvent::PassFailed { timings, .. } => {
                Some(timings)
            }
            _ => None,
        }
    }
}

/// Chronological record of one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ledger {
    events: Vec<BuildEvent>,
}

impl Ledger {
    pub fn events(&self) -> &[BuildEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BuildEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Passes that ran to completion, in execution order.
    pub fn executed(&self) -> impl Iterator<Item = (&QualifiedName, &PassTimings)> + '_ {
        self.events.iter().filter_map(|event| match event {
            BuildEvent::PassExecuted {
                qualified_name,
                timings,
                ..
            } => Some((qualified_name, timings)),
            _ => None,
        })
    }

    /// The failed pass event, if the build failed in a pass.
    pub fn failure(&self) -> Option<&BuildEvent> {
        self.events
            .iter()
            .find(|event| matches!(event, BuildEvent::PassFailed { .. }))
    }

    /// Whether the build has ended, successfully or not.
    pub fn is_complete(&self) -> bool {
        matches!(self.events.last(), Some(BuildEvent::BuildEnded { .. }))
    }

    /// `Some(succeeded)` once the build has ended.
    pub fn succeeded(&self) -> Option<bool> {
        match self.events.last() {
            Some(BuildEvent::BuildEnded { succeeded }) => Some(*succeeded),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a BuildEvent;
    type IntoIter = std::slice::Iter<'a, BuildEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Appends events to a fresh ledger and notifies listeners after each append.
pub(crate) struct Recorder<'a> {
    ledger: Ledger,
    listeners: &'a [BuildEventListener],
}

impl<'a> Recorder<'a> {
    pub(crate) fn new(listeners: &'a [BuildEventListener]) -> Self {
        Self {
            ledger: Ledger::default(),
            listeners,
        }
    }

    pub(crate) fn record(&mut self, event: BuildEvent) {
        self.ledger.events.push(event);
        if let Some(event) = self.ledger.events.last() {
            for listener in self.listeners {
                listener(event);
            }
        }
    }

    pub(crate) fn finish(self) -> Ledger {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::testing::AlphaContext;

    fn name(s: &str) -> QualifiedName {
        QualifiedName::new(s).unwrap()
    }

    #[test]
    fn test_recorder_notifies_after_append() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let listeners: Vec<BuildEventListener> =
            vec![Box::new(move |event| sink.borrow_mut().push(event.clone()))];

        let mut recorder = Recorder::new(&listeners);
        recorder.record(BuildEvent::BuildStarted);
        recorder.record(BuildEvent::BuildEnded { succeeded: true });
        let ledger = recorder.finish();

        assert_eq!(ledger.events(), seen.borrow().as_slice());
        assert!(ledger.is_complete());
        assert_eq!(ledger.succeeded(), Some(true));
    }

    #[test]
    fn test_total_includes_transitions() {
        let mut timings = PassTimings {
            execution: Some(Duration::from_millis(5)),
            ..PassTimings::default()
        };
        timings
            .activation
            .insert(ContextType::of::<AlphaContext>(), Duration::from_millis(2));
        timings
            .deactivation
            .insert(ContextType::of::<AlphaContext>(), Duration::from_millis(1));
        assert_eq!(timings.total(), Duration::from_millis(8));
        assert!(timings.has_transitions());
    }

    #[test]
    fn test_event_json_shape() {
        let mut timings = PassTimings {
            execution: Some(Duration::from_micros(1500)),
            ..PassTimings::default()
        };
        timings
            .activation
            .insert(ContextType::of::<AlphaContext>(), Duration::from_millis(2));
        let event = BuildEvent::PassExecuted {
            qualified_name: name("p.x"),
            plugin: name("p"),
            timings,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "pass_executed",
                "qualified_name": "p.x",
                "plugin": "p",
                "execution_ms": 1.5,
                "activation_ms": { "AlphaContext": 2.0 },
                "deactivation_ms": {}
            })
        );
    }

    #[test]
    fn test_phase_finished_json_shape() {
        let event = BuildEvent::PhaseFinished {
            phase: Phase::Optimizing,
            status: PhaseStatus::Failed,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "event": "phase_finished", "phase": "optimizing", "status": "failed" })
        );
    }

    #[test]
    fn test_incomplete_ledger() {
        let mut recorder = Recorder::new(&[]);
        recorder.record(BuildEvent::BuildStarted);
        let ledger = recorder.finish();
        assert!(!ledger.is_complete());
        assert_eq!(ledger.succeeded(), None);
        assert!(ledger.failure().is_none());
    }
}
