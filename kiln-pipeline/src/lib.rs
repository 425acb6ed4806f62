//! Plugin pass resolution and execution engine for kiln.
//!
//! Plugins contribute passes to phases. The resolver turns their ordering
//! constraints into a deterministic plan, and the pipeline replays that plan
//! against a build target while managing shared extension contexts and
//! recording an event ledger.
//!
//! # Module Organization
//!
//! - [`pass`] / [`plugin`] - Declarations (Pass, Plugin, Constraint, PassContext)
//! - [`resolver`] - Deterministic ordering (resolve, Resolution)
//! - [`registry`] - Reference-counted extension contexts (ContextRegistry)
//! - [`lifecycle`] - When contexts are activated and deactivated
//! - [`runner`] - Execution (Pipeline, BuildReport)
//! - [`ledger`] - Build events (BuildEvent, Ledger)
//! - [`timing`] - Timing tree reconstruction for reports
//! - [`testing`] - Test utilities (feature-gated)

mod context;
mod diagnostic;
mod error;
mod guard;
pub mod ledger;
pub mod lifecycle;
mod observer;
mod options;
pub mod pass;
mod plan;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod timing;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::{ContextRequirement, ExtensionContext};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{BoxError, BuildError, ContextError, CycleError, ResolveError, error_chain};
pub use ledger::{BuildEvent, BuildEventListener, Ledger, PassTimings, PhaseStatus};
pub use lifecycle::{Transition, plan_transitions};
pub use observer::{Activity, ActivityLog, ActivityObserver, TracingActivityObserver};
pub use options::{ContextPolicy, ExecutionOptions};
pub use pass::{Constraint, ConstraintTarget, Pass, PassContext};
pub use plan::{PlannedPass, ResolvedPlan};
pub use plugin::Plugin;
pub use registry::{Acquired, ContextHandle, ContextRegistry};
pub use resolver::{Resolution, resolve};
pub use runner::{BuildReport, Pipeline};
pub use timing::{NodeKind, TimingNode, TimingTree};
