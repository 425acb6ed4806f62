//! Check operation - resolution diagnostics.

use kiln_pipeline::{ResolveError, Severity};

use crate::{
    demo::{self, DemoOptions},
    reports::CheckReport,
};

/// Execute the check operation.
///
/// Resolves the demo pipeline and sorts its diagnostics by severity.
pub fn check() -> Result<CheckReport, ResolveError> {
    let resolution = demo::pipeline(&DemoOptions::default()).resolve()?;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut infos = Vec::new();

    for diag in &resolution.diagnostics {
        let msg = if let Some(loc) = &diag.location {
            format!("{}\n  --> {}", diag.message, loc)
        } else {
            diag.message.clone()
        };

        match diag.severity {
            Severity::Error => errors.push(msg),
            Severity::Warning => warnings.push(msg),
            Severity::Info => infos.push(msg),
        }
    }

    Ok(CheckReport {
        errors,
        warnings,
        infos,
        passes: resolution.plan.len(),
        phases: resolution.plan.phases().count(),
    })
}
