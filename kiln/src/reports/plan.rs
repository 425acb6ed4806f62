//! Plan command report.

use kiln_pipeline::{ContextPolicy, ResolvedPlan, Transition, plan_transitions};

use super::output::{Output, Report};

/// A resolved plan, listed phase by phase.
#[derive(Debug)]
pub struct PlanReport {
    pub plan: ResolvedPlan,
    pub policy: ContextPolicy,
    /// Include internal passes.
    pub show_internal: bool,
}

impl Report for PlanReport {
    fn render(&self, out: &mut dyn Output) {
        out.title("Build plan");

        for (phase, passes) in self.plan.phases() {
            out.section(phase.name());

            let transitions = plan_transitions(passes, self.policy);
            let mut shown = 0;
            for (pass, transition) in passes.iter().zip(&transitions) {
                if pass.internal && !self.show_internal {
                    continue;
                }
                shown += 1;

                let mut line = pass.qualified_name.to_string();
                if pass.internal {
                    line.push_str(" (internal)");
                }
                if !transition.is_empty() {
                    line.push_str(&format!(" [{}]", transition_summary(transition)));
                }
                out.numbered_item(shown, &line);
            }

            if shown == 0 {
                out.list_item("no passes");
            }
        }

        out.newline();
        out.key_value("context policy", &self.policy.to_string());
    }
}

/// `+Activated -Deactivated` in transition order.
fn transition_summary(transition: &Transition) -> String {
    transition
        .activate
        .iter()
        .map(|context| format!("+{}", context))
        .chain(transition.deactivate.iter().map(|context| format!("-{}", context)))
        .collect::<Vec<_>>()
        .join(" ")
}
