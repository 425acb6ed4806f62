//! Check command report data structures.

use super::output::{Output, Report};

/// Diagnostics from resolving the demo plugins.
#[derive(Debug)]
pub struct CheckReport {
    /// Error messages.
    pub errors: Vec<String>,
    /// Warning messages.
    pub warnings: Vec<String>,
    /// Info messages.
    pub infos: Vec<String>,
    /// Scheduled passes, internal ones included.
    pub passes: usize,
    pub phases: usize,
}

impl CheckReport {
    /// Whether the check passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Report for CheckReport {
    fn render(&self, out: &mut dyn Output) {
        for error in &self.errors {
            out.warning(&format!("error: {}", error));
        }

        for warning in &self.warnings {
            out.warning(&format!("warning: {}", warning));
        }

        for info in &self.infos {
            out.preformatted(&format!("info: {}", info));
        }

        if !self.warnings.is_empty() || !self.errors.is_empty() {
            out.newline();
        }

        if self.is_valid() {
            out.preformatted(&format!(
                "✓ {} pass{} in {} phase{} resolved",
                self.passes,
                if self.passes == 1 { "" } else { "es" },
                self.phases,
                if self.phases == 1 { "" } else { "s" },
            ));
        }
    }
}
