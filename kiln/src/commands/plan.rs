use clap::Args;
use eyre::{Context, Result};
use kiln_pipeline::ContextPolicy;

use super::UnwrapOrExit;
use crate::{
    ops,
    reports::{Report, TerminalOutput},
};

#[derive(Args)]
pub struct PlanCommand {
    /// Context policy used to annotate activations
    #[arg(short, long, default_value_t = ContextPolicy::Lookahead)]
    pub policy: ContextPolicy,

    /// Include internal passes
    #[arg(short, long)]
    pub all: bool,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub fn run(&self) -> Result<()> {
        let report = ops::plan(self.policy, self.all).unwrap_or_exit();

        if self.json {
            let json =
                serde_json::to_string_pretty(&report.plan).wrap_err("Failed to serialize plan")?;
            println!("{}", json);
        } else {
            report.render(&mut TerminalOutput::new());
        }

        Ok(())
    }
}
