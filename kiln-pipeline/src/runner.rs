//! Pipeline orchestrator.

use std::time::Instant;

use indexmap::IndexMap;
use kiln_core::{ContextType, Phase, as_millis};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    ActivityObserver, BuildError, BuildEvent, ContextError, ContextPolicy, ExecutionOptions, Ledger, Pass,
    PassContext, PassTimings, PhaseStatus, PlannedPass, Plugin, ResolveError, Resolution,
    ResolvedPlan,
    error::error_chain,
    guard,
    ledger::{BuildEventListener, Recorder},
    lifecycle::{Transition, plan_transitions},
    registry::{ContextHandle, ContextRegistry},
    resolver,
};

/// Outcome of one [`Pipeline::execute`] call.
#[derive(Debug)]
pub struct BuildReport {
    pub outcome: Result<(), BuildError>,
    pub ledger: Ledger,
    /// Final status of every planned phase.
    pub phases: IndexMap<Phase, PhaseStatus>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&BuildError> {
        self.outcome.as_ref().err()
    }
}

/// The build pipeline orchestrator.
///
/// Plugins are registered up front; [`resolve`](Self::resolve) turns their
/// declarations into a [`ResolvedPlan`] and [`execute`](Self::execute)
/// replays a plan against a build target, managing extension contexts and
/// recording a [`Ledger`].
///
/// # Example
///
/// ```ignore
/// let mut pipeline = Pipeline::new()
///     .plugin(rename_plugin())
///     .plugin(merge_plugin())
///     .on_build_event(|event| println!("{event:?}"));
///
/// let resolution = pipeline.resolve()?;
/// let report = pipeline.execute(&resolution.plan, &mut scene);
/// report.outcome?;
/// ```
pub struct Pipeline<T> {
    plugins: Vec<Plugin<T>>,
    phases: Vec<Phase>,
    options: ExecutionOptions,
    listeners: Vec<BuildEventListener>,
    observer: Option<Box<dyn ActivityObserver>>,
    last_ledger: Option<Ledger>,
}

/// A failed pass: the error plus whatever timings were measured before it.
struct PassFailure {
    error: BuildError,
    timings: PassTimings,
}

impl<T> Pipeline<T> {
    /// Create a pipeline running every phase with default options.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            phases: Phase::ALL.to_vec(),
            options: ExecutionOptions::default(),
            listeners: Vec::new(),
            observer: None,
            last_ledger: None,
        }
    }

    /// Register a plugin. Registration order is the ordering tie-break.
    pub fn plugin(mut self, plugin: Plugin<T>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Restrict the phases this pipeline runs.
    pub fn phases(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.phases = phases.into_iter().collect();
        self
    }

    pub fn options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn context_policy(mut self, policy: ContextPolicy) -> Self {
        self.options.context_policy = policy;
        self
    }

    /// Subscribe to events as they are appended to the ledger.
    pub fn on_build_event(mut self, listener: impl Fn(&BuildEvent) + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Install an observer that is told which pass is running and receives
    /// activities reported by pass bodies.
    pub fn activity_observer(mut self, observer: impl ActivityObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn registered_plugins(&self) -> &[Plugin<T>] {
        &self.plugins
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        self.options
    }

    /// Resolve the registered plugins into a plan.
    ///
    /// # Errors
    ///
    /// See [`resolve`](crate::resolve).
    pub fn resolve(&self) -> Result<Resolution, ResolveError> {
        resolver::resolve(&self.phases, &self.plugins)
    }

    /// Ledger of the most recent build, if one has finished since the last
    /// `execute` call started.
    pub fn last_ledger(&self) -> Option<&Ledger> {
        self.last_ledger.as_ref()
    }

    /// Resolve and execute in one step.
    ///
    /// # Errors
    ///
    /// Returns the resolution error; build failures are in the report.
    pub fn run(&mut self, target: &mut T) -> Result<BuildReport, ResolveError> {
        let resolution = self.resolve()?;
        Ok(self.execute(&resolution.plan, target))
    }

    /// Execute a plan produced by [`resolve`](Self::resolve) against `target`.
    ///
    /// Phases run in plan order and passes strictly sequentially. The first
    /// failure aborts the rest of its phase and every later phase. The ledger
    /// always ends with [`BuildEvent::BuildEnded`].
    pub fn execute(&mut self, plan: &ResolvedPlan, target: &mut T) -> BuildReport {
        self.last_ledger = None;
        let report = self.execute_plan(plan, target);
        self.last_ledger = Some(report.ledger.clone());
        report
    }

    fn execute_plan(&self, plan: &ResolvedPlan, target: &mut T) -> BuildReport {
        let started = Instant::now();
        let mut recorder = Recorder::new(&self.listeners);
        let mut phases: IndexMap<Phase, PhaseStatus> = plan
            .phases()
            .map(|(phase, _)| (phase, PhaseStatus::NotStarted))
            .collect();

        info!(
            passes = plan.len(),
            policy = %self.options.context_policy,
            "build started"
        );
        recorder.record(BuildEvent::BuildStarted);

        let outcome = self.run_phases(plan, target, &mut recorder, &mut phases);
        let succeeded = outcome.is_ok();
        recorder.record(BuildEvent::BuildEnded { succeeded });

        info!(
            succeeded,
            elapsed_ms = as_millis(started.elapsed()),
            "build finished"
        );

        BuildReport {
            outcome,
            ledger: recorder.finish(),
            phases,
        }
    }

    fn run_phases(
        &self,
        plan: &ResolvedPlan,
        target: &mut T,
        recorder: &mut Recorder<'_>,
        statuses: &mut IndexMap<Phase, PhaseStatus>,
    ) -> Result<(), BuildError> {
        for (_, passes) in plan.phases() {
            for planned in passes {
                self.pass_at(planned)?;
            }
        }

        let mut registry = ContextRegistry::new().catch_panics(self.options.catch_panics);

        for (phase, passes) in plan.phases() {
            let span = info_span!("phase", phase = %phase);
            let _entered = span.enter();

            statuses.insert(phase, PhaseStatus::Running);
            recorder.record(BuildEvent::PhaseStarted { phase });

            let result = self.run_phase(passes, target, &mut registry, recorder);
            let status = if result.is_ok() {
                PhaseStatus::Completed
            } else {
                PhaseStatus::Failed
            };
            statuses.insert(phase, status);
            recorder.record(BuildEvent::PhaseFinished { phase, status });
            result?;
        }

        Ok(())
    }

    fn run_phase(
        &self,
        passes: &[PlannedPass],
        target: &mut T,
        registry: &mut ContextRegistry<T>,
        recorder: &mut Recorder<'_>,
    ) -> Result<(), BuildError> {
        let transitions = plan_transitions(passes, self.options.context_policy);
        let mut held: IndexMap<ContextType, ContextHandle> = IndexMap::new();

        for (planned, transition) in passes.iter().zip(&transitions) {
            let pass = self.pass_at(planned)?;

            match self.run_pass(planned, pass, transition, target, registry, &mut held) {
                Ok(timings) => {
                    debug!(
                        pass = %planned.qualified_name,
                        plugin = %planned.plugin,
                        elapsed_ms = as_millis(timings.total()),
                        "pass executed"
                    );
                    recorder.record(BuildEvent::PassExecuted {
                        qualified_name: planned.qualified_name.clone(),
                        plugin: planned.plugin.clone(),
                        timings,
                    });
                }
                Err(PassFailure { error, mut timings }) => {
                    release_held(&mut held, registry, target, &mut timings);
                    let cause = error_chain(&error);
                    error!(
                        pass = %planned.qualified_name,
                        plugin = %planned.plugin,
                        error = %cause,
                        "pass failed, aborting build"
                    );
                    recorder.record(BuildEvent::PassFailed {
                        qualified_name: planned.qualified_name.clone(),
                        plugin: planned.plugin.clone(),
                        error: cause,
                        timings,
                    });
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    fn run_pass(
        &self,
        planned: &PlannedPass,
        pass: &Pass<T>,
        transition: &Transition,
        target: &mut T,
        registry: &mut ContextRegistry<T>,
        held: &mut IndexMap<ContextType, ContextHandle>,
    ) -> Result<PassTimings, PassFailure> {
        let mut timings = PassTimings::default();

        for &context in &transition.activate {
            let Some(requirement) = pass.requirement(context) else {
                return Err(PassFailure {
                    error: BuildError::StalePlan {
                        pass: planned.qualified_name.clone(),
                    },
                    timings,
                });
            };
            match registry.require(requirement, target) {
                Ok(acquired) => {
                    if let Some(elapsed) = acquired.activation {
                        timings.activation.insert(context, elapsed);
                    }
                    held.insert(context, acquired.handle);
                }
                Err(source) => return Err(activation_failure(planned, context, source, timings)),
            }
        }

        // One handle per requirement for the duration of the body.
        let mut scoped = Vec::with_capacity(pass.requirements().len());
        for requirement in pass.requirements() {
            match registry.require(requirement, target) {
                Ok(acquired) => scoped.push(acquired.handle),
                Err(source) => {
                    release_scoped(scoped, registry, target);
                    return Err(activation_failure(
                        planned,
                        requirement.context_type(),
                        source,
                        timings,
                    ));
                }
            }
        }

        let observer = self.observer.as_deref();
        if let Some(observer) = observer {
            observer.pass_started(&planned.qualified_name, &planned.plugin);
        }

        let started = Instant::now();
        let result = {
            let mut cx = PassContext::new(
                &mut *target,
                &mut *registry,
                &planned.qualified_name,
                &planned.plugin,
                observer,
            );
            guard::invoke(self.options.catch_panics, || pass.run(&mut cx))
        };
        timings.execution = Some(started.elapsed());

        if let Some(observer) = observer {
            observer.pass_finished(&planned.qualified_name, &planned.plugin);
        }
        release_scoped(scoped, registry, target);

        if let Err(source) = result {
            return Err(PassFailure {
                error: BuildError::PassFailed {
                    pass: planned.qualified_name.clone(),
                    plugin: planned.plugin.clone(),
                    source: source.into(),
                },
                timings,
            });
        }

        for context in &transition.deactivate {
            let Some(handle) = held.shift_remove(context) else {
                continue;
            };
            let started = Instant::now();
            match registry.release(handle, target) {
                Ok(Some(elapsed)) => {
                    timings.deactivation.insert(*context, elapsed);
                }
                Ok(None) => {}
                Err(source) => {
                    if matches!(source, ContextError::Deactivation { .. }) {
                        timings.deactivation.insert(*context, started.elapsed());
                    }
                    return Err(PassFailure {
                        error: BuildError::ContextDeactivation {
                            context: *context,
                            pass: planned.qualified_name.clone(),
                            plugin: planned.plugin.clone(),
                            source,
                        },
                        timings,
                    });
                }
            }
        }

        Ok(timings)
    }

    /// The registered pass a planned pass refers to.
    fn pass_at(&self, planned: &PlannedPass) -> Result<&Pass<T>, BuildError> {
        self.plugins
            .get(planned.location.plugin)
            .filter(|plugin| planned.plugin == plugin.name())
            .and_then(|plugin| plugin.passes().get(planned.location.pass))
            .filter(|pass| {
                planned.qualified_name == pass.name() && pass.required_types() == planned.requires
            })
            .ok_or_else(|| BuildError::StalePlan {
                pass: planned.qualified_name.clone(),
            })
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn activation_failure(
    planned: &PlannedPass,
    context: ContextType,
    source: ContextError,
    timings: PassTimings,
) -> PassFailure {
    PassFailure {
        error: BuildError::ContextActivation {
            context,
            pass: planned.qualified_name.clone(),
            plugin: planned.plugin.clone(),
            source,
        },
        timings,
    }
}

fn release_scoped<T>(scoped: Vec<ContextHandle>, registry: &mut ContextRegistry<T>, target: &mut T) {
    for handle in scoped.into_iter().rev() {
        if let Err(err) = registry.release(handle, target) {
            warn!(error = %error_chain(&err), "failed to release pass-scoped context");
        }
    }
}

/// Release every context the engine still holds, newest first, recording
/// the deactivations against the failing pass.
fn release_held<T>(
    held: &mut IndexMap<ContextType, ContextHandle>,
    registry: &mut ContextRegistry<T>,
    target: &mut T,
    timings: &mut PassTimings,
) {
    while let Some((context, handle)) = held.pop() {
        match registry.release(handle, target) {
            Ok(Some(elapsed)) => {
                timings.deactivation.insert(context, elapsed);
            }
            Ok(None) => {}
            Err(err) => warn!(
                context = %context,
                error = %error_chain(&err),
                "context failed to deactivate while aborting"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        ActivityLog,
        testing::{
            AlphaContext, FailingContext, FailingDeactivation, TestTarget, event_names,
            failing_pass, logging_pass, panicking_pass, plugin,
        },
    };

    const T: Phase = Phase::Transforming;

    fn noop(name: &str) -> Pass<TestTarget> {
        Pass::new(name, T, |_| Ok(()))
    }

    #[test]
    fn test_pipeline_runs_passes_in_order() {
        let mut pipeline = Pipeline::new()
            .phases([T])
            .plugin(plugin("p1", [logging_pass("p1.a", T)]))
            .plugin(plugin("p2", [logging_pass("p2.b", T)]));
        let mut target = TestTarget::new();

        let report = pipeline.run(&mut target).unwrap();

        assert!(report.succeeded());
        assert_eq!(target.entries(), ["run p1.a", "run p2.b"]);
        assert_eq!(
            event_names(&report.ledger),
            [
                "build started",
                "phase Transforming",
                "executed p1.a",
                "executed p2.b",
                "phase Transforming completed",
                "build ended succeeded=true",
            ]
        );
        assert_eq!(report.phases[&T], PhaseStatus::Completed);
    }

    #[test]
    fn test_listeners_see_every_event() {
        let seen = Rc::new(RefCell::new(0usize));
        let counter = Rc::clone(&seen);
        let mut pipeline = Pipeline::new()
            .plugin(plugin("p1", [logging_pass("p1.a", T)]))
            .on_build_event(move |_| *counter.borrow_mut() += 1);

        let report = pipeline.run(&mut TestTarget::new()).unwrap();
        assert_eq!(*seen.borrow(), report.ledger.len());
    }

    #[test]
    fn test_panicking_pass_fails_build() {
        let mut pipeline = Pipeline::new().plugin(plugin("p1", [panicking_pass("p1.boom", T)]));
        let report = pipeline.run(&mut TestTarget::new()).unwrap();

        let Some(BuildError::PassFailed { source, .. }) = report.error() else {
            panic!("expected a pass failure");
        };
        assert!(source.to_string().contains("pass body panicked"));
        assert_eq!(report.ledger.succeeded(), Some(false));
    }

    #[test]
    fn test_activation_failure_is_attributed_to_pass() {
        let mut pipeline = Pipeline::new().plugin(plugin(
            "p1",
            [
                noop("p1.a").requires::<AlphaContext>().compatible_with::<FailingContext>(),
                noop("p1.b").requires::<AlphaContext>().requires::<FailingContext>(),
            ],
        ));
        let mut target = TestTarget::new();
        let report = pipeline.run(&mut target).unwrap();

        let Some(BuildError::ContextActivation { context, pass, .. }) = report.error() else {
            panic!("expected an activation failure");
        };
        assert_eq!(*context, ContextType::of::<FailingContext>());
        assert_eq!(pass, "p1.b");
        // Alpha stayed active across both passes and is released on the failure path.
        assert_eq!(target.entries(), ["activate Alpha", "deactivate Alpha"]);

        let Some(BuildEvent::PassFailed { timings, .. }) = report.ledger.failure() else {
            panic!("expected a failure event");
        };
        assert!(timings.execution.is_none());
        assert!(timings.deactivation.contains_key(&ContextType::of::<AlphaContext>()));
    }

    #[test]
    fn test_deactivation_failure_fails_build() {
        let mut pipeline = Pipeline::new().plugin(plugin(
            "p1",
            [noop("p1.a").requires::<FailingDeactivation>(), noop("p1.b")],
        ));
        let mut target = TestTarget::new();
        let report = pipeline.run(&mut target).unwrap();

        assert!(matches!(
            report.error(),
            Some(BuildError::ContextDeactivation { .. })
        ));
        assert_eq!(
            event_names(&report.ledger)
                .iter()
                .filter(|e| e.starts_with("executed"))
                .count(),
            0
        );

        let timings = report
            .ledger
            .failure()
            .and_then(BuildEvent::timings)
            .unwrap();
        assert!(timings.execution.is_some());
        assert!(
            timings
                .deactivation
                .contains_key(&ContextType::of::<FailingDeactivation>())
        );
    }

    #[test]
    fn test_stale_plan_rejected_before_running() {
        let source = Pipeline::new().plugin(plugin("p1", [logging_pass("p1.a", T)]));
        let plan = source.resolve().unwrap().plan;

        let mut other = Pipeline::new().plugin(plugin("p9", [logging_pass("p9.z", T)]));
        let mut target = TestTarget::new();
        let report = other.execute(&plan, &mut target);

        assert!(matches!(report.error(), Some(BuildError::StalePlan { .. })));
        assert!(target.log.is_empty());
        assert_eq!(
            event_names(&report.ledger),
            ["build started", "build ended succeeded=false"]
        );
        assert!(report.phases.values().all(|s| *s == PhaseStatus::NotStarted));
    }

    #[test]
    fn test_last_ledger_replaced_per_build() {
        let mut pipeline = Pipeline::new().plugin(plugin(
            "p1",
            [logging_pass("p1.a", T), failing_pass("p1.b", T)],
        ));
        assert!(pipeline.last_ledger().is_none());

        let plan = pipeline.resolve().unwrap().plan;
        let first = pipeline.execute(&plan, &mut TestTarget::new());
        assert_eq!(pipeline.last_ledger(), Some(&first.ledger));

        let second = pipeline.execute(&plan, &mut TestTarget::new());
        assert_eq!(pipeline.last_ledger().map(Ledger::len), Some(second.ledger.len()));
    }

    #[test]
    fn test_observer_attributes_activity_to_running_pass() {
        let log = Rc::new(ActivityLog::new());
        let mut pipeline = Pipeline::new()
            .plugin(plugin(
                "p1",
                [Pass::<TestTarget>::new("p1.touch", T, |cx| {
                    cx.target_mut().log.push("touched".into());
                    cx.record_activity("touched the target");
                    Ok(())
                })],
            ))
            .activity_observer(Rc::clone(&log));

        pipeline.run(&mut TestTarget::new()).unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to_string(), "touched the target by p1.touch");
        assert_eq!(log.current_pass(), None);
    }
}
