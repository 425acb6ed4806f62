//! Plan operation - resolve the demo plugins.

use kiln_pipeline::{ContextPolicy, ResolveError};

use crate::{
    demo::{self, DemoOptions},
    reports::PlanReport,
};

/// Resolve the demo pipeline into a plan report.
pub fn plan(policy: ContextPolicy, show_internal: bool) -> Result<PlanReport, ResolveError> {
    let options = DemoOptions { policy, fail: None };
    let resolution = demo::pipeline(&options).resolve()?;

    Ok(PlanReport {
        plan: resolution.plan,
        policy,
        show_internal,
    })
}
