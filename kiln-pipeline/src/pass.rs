//! Pass declarations and the context handed to pass bodies.

use std::fmt;

use eyre::{Result, eyre};
use kiln_core::{ContextType, Phase, QualifiedName};
use serde::Serialize;

use crate::{
    ActivityObserver,
    context::{ContextRequirement, ExtensionContext},
    observer::Activity,
    registry::ContextRegistry,
};

/// The body of a pass.
pub type PassBody<T> = Box<dyn Fn(&mut PassContext<'_, T>) -> Result<()>>;

/// What an ordering constraint points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ConstraintTarget {
    /// A single pass, by qualified name.
    Pass(String),
    /// Every pass of a plugin in the same phase, by plugin name.
    Plugin(String),
}

impl fmt::Display for ConstraintTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintTarget::Pass(name) => write!(f, "pass '{}'", name),
            ConstraintTarget::Plugin(name) => write!(f, "plugin '{}'", name),
        }
    }
}

/// An ordering constraint relative to other passes of the same phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// The declaring pass runs before the target.
    Before(ConstraintTarget),
    /// The declaring pass runs after the target.
    After(ConstraintTarget),
}

impl Constraint {
    pub fn target(&self) -> &ConstraintTarget {
        match self {
            Constraint::Before(target) | Constraint::After(target) => target,
        }
    }
}

/// A unit of work contributed by a plugin to one phase.
///
/// # Example
///
/// ```ignore
/// let pass = Pass::new("demo.merge.collapse", Phase::Transforming, |cx| {
///     let tracker = cx.require_extension::<RenameTracker>()?;
///     tracker.rename("a", "b");
///     Ok(())
/// })
/// .with_description("Collapse empty groups")
/// .after_pass("demo.rename.apply-prefix")
/// .requires::<RenameTracker>();
/// ```
pub struct Pass<T> {
    name: String,
    description: String,
    phase: Phase,
    internal: bool,
    requires: Vec<ContextRequirement<T>>,
    compatible: Vec<ContextType>,
    constraints: Vec<Constraint>,
    body: PassBody<T>,
}

impl<T> Pass<T> {
    /// Declare a pass with its qualified name, phase and body.
    pub fn new(
        name: impl Into<String>,
        phase: Phase,
        body: impl Fn(&mut PassContext<'_, T>) -> Result<()> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            phase,
            internal: false,
            requires: Vec::new(),
            compatible: Vec::new(),
            constraints: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Set the human-readable description shown in reports.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the pass as internal: scheduled and executed, hidden from reports.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Require an extension context, constructed with its factory, while
    /// this pass runs.
    pub fn requires_requirement(mut self, requirement: ContextRequirement<T>) -> Self {
        let context_type = requirement.context_type();
        if !self
            .requires
            .iter()
            .any(|existing| existing.context_type() == context_type)
        {
            self.requires.push(requirement);
        }
        self
    }

    /// Tolerate an extension context being active while this pass runs
    /// without requiring it.
    pub fn compatible_with<C: 'static>(mut self) -> Self {
        let context_type = ContextType::of::<C>();
        if !self.compatible.contains(&context_type) {
            self.compatible.push(context_type);
        }
        self
    }

    pub fn before_pass(self, name: impl Into<String>) -> Self {
        self.constraint(Constraint::Before(ConstraintTarget::Pass(name.into())))
    }

    pub fn after_pass(self, name: impl Into<String>) -> Self {
        self.constraint(Constraint::After(ConstraintTarget::Pass(name.into())))
    }

    pub fn before_plugin(self, name: impl Into<String>) -> Self {
        self.constraint(Constraint::Before(ConstraintTarget::Plugin(name.into())))
    }

    pub fn after_plugin(self, name: impl Into<String>) -> Self {
        self.constraint(Constraint::After(ConstraintTarget::Plugin(name.into())))
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn requirements(&self) -> &[ContextRequirement<T>] {
        &self.requires
    }

    /// Context types this pass requires, in declaration order.
    pub fn required_types(&self) -> Vec<ContextType> {
        self.requires
            .iter()
            .map(ContextRequirement::context_type)
            .collect()
    }

    pub fn compatible_types(&self) -> &[ContextType] {
        &self.compatible
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub(crate) fn requirement(&self, context_type: ContextType) -> Option<&ContextRequirement<T>> {
        self.requires
            .iter()
            .find(|requirement| requirement.context_type() == context_type)
    }

    pub(crate) fn run(&self, cx: &mut PassContext<'_, T>) -> Result<()> {
        (self.body)(cx)
    }
}

impl<T: 'static> Pass<T> {
    /// Require a `Default`-constructed extension context while this pass runs.
    pub fn requires<C>(self) -> Self
    where
        C: ExtensionContext<T> + Default,
    {
        self.requires_requirement(ContextRequirement::of::<C>())
    }

    /// Require an extension context built by `factory` on activation.
    pub fn requires_with<C>(self, factory: impl Fn() -> C + 'static) -> Self
    where
        C: ExtensionContext<T>,
    {
        self.requires_requirement(ContextRequirement::with_factory(factory))
    }
}

impl<T> fmt::Debug for Pass<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("internal", &self.internal)
            .field("requires", &self.required_types())
            .field("compatible", &self.compatible)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// What a pass body sees while it runs.
pub struct PassContext<'a, T> {
    target: &'a mut T,
    registry: &'a mut ContextRegistry<T>,
    pass: &'a QualifiedName,
    plugin: &'a QualifiedName,
    observer: Option<&'a dyn ActivityObserver>,
}

impl<'a, T> PassContext<'a, T> {
    pub(crate) fn new(
        target: &'a mut T,
        registry: &'a mut ContextRegistry<T>,
        pass: &'a QualifiedName,
        plugin: &'a QualifiedName,
        observer: Option<&'a dyn ActivityObserver>,
    ) -> Self {
        Self {
            target,
            registry,
            pass,
            plugin,
            observer,
        }
    }

    pub fn target(&self) -> &T {
        &*self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut *self.target
    }

    /// Qualified name of the running pass.
    pub fn pass_name(&self) -> &QualifiedName {
        self.pass
    }

    /// Qualified name of the plugin that contributed the running pass.
    pub fn plugin_name(&self) -> &QualifiedName {
        self.plugin
    }

    /// Borrow an active extension context.
    pub fn extension<C: 'static>(&self) -> Option<&C> {
        self.registry.get::<C>()
    }

    pub fn extension_mut<C: 'static>(&mut self) -> Option<&mut C> {
        self.registry.get_mut::<C>()
    }

    /// Borrow an active extension context, failing the pass if it is inactive.
    pub fn require_extension<C: 'static>(&mut self) -> Result<&mut C> {
        let pass = self.pass;
        self.registry.get_mut::<C>().ok_or_else(|| {
            eyre!(
                "extension context {} is not active for pass '{}'",
                ContextType::of::<C>(),
                pass
            )
        })
    }

    /// Borrow the target and an active extension context at the same time.
    pub fn split<C: 'static>(&mut self) -> Option<(&mut T, &mut C)> {
        let context = self.registry.get_mut::<C>()?;
        Some((&mut *self.target, context))
    }

    /// Report an incidental mutation, attributed to the running pass.
    ///
    /// Does nothing when no activity observer is installed.
    pub fn record_activity(&self, description: impl Into<String>) {
        if let Some(observer) = self.observer {
            observer.activity(&Activity {
                pass: self.pass.clone(),
                plugin: self.plugin.clone(),
                description: description.into(),
            });
        }
    }
}
