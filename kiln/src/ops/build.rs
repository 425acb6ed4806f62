//! Build operation - run the demo pipeline on the sample scene.

use kiln_pipeline::{BuildReport, ResolveError, ResolvedPlan, TimingTree, error_chain};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    demo::{self, DemoOptions, Scene},
    reports::{BuildSummary, describe_event},
};

/// Everything a build produced.
#[derive(Debug)]
pub struct BuildOutcome {
    pub plan: ResolvedPlan,
    pub report: BuildReport,
    pub scene: Scene,
    pub tree: TimingTree,
}

impl BuildOutcome {
    pub fn summary(&self, options: &DemoOptions, with_events: bool) -> BuildSummary {
        let events = with_events.then(|| self.report.ledger.iter().map(describe_event).collect());
        let failure = self.report.error().map(|error| {
            let plugin = error
                .plugin()
                .map(|plugin| format!(" ({})", plugin))
                .unwrap_or_default();
            let cause = std::error::Error::source(error)
                .map(error_chain)
                .unwrap_or_else(|| error.to_string());
            format!("{}{}: {}", error.pass(), plugin, cause)
        });

        BuildSummary {
            tree: self.tree.root().clone(),
            policy: options.policy,
            events,
            failure,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "succeeded": self.report.succeeded(),
            "error": self.report.error().map(|error| error_chain(error)),
            "phases": self.report.phases,
            "plan": self.plan,
            "timings": self.tree,
            "events": self.report.ledger,
            "scene": self.scene,
        })
    }
}

/// Execute the build operation.
pub fn build(options: &DemoOptions) -> Result<BuildOutcome, ResolveError> {
    let mut pipeline = demo::pipeline(options);
    let resolution = pipeline.resolve()?;
    for warning in resolution.warnings() {
        info!(%warning, "resolved with warning");
    }

    let mut scene = Scene::sample();
    let report = pipeline.execute(&resolution.plan, &mut scene);
    let tree = TimingTree::build(&resolution.plan, &report.ledger);

    Ok(BuildOutcome {
        plan: resolution.plan,
        report,
        scene,
        tree,
    })
}
