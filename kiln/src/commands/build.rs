use clap::Args;
use eyre::{Context, Result};
use kiln_pipeline::ContextPolicy;

use super::UnwrapOrExit;
use crate::{
    demo::{self, DemoOptions},
    ops,
    reports::{Report, TerminalOutput},
};

#[derive(Args)]
pub struct BuildCommand {
    /// When extension contexts are torn down: lookahead or per-pass
    #[arg(short, long, default_value_t = ContextPolicy::Lookahead)]
    pub policy: ContextPolicy,

    /// Make the named pass fail, to see how the build aborts
    #[arg(long, value_name = "PASS", value_parser = parse_pass_name)]
    pub fail: Option<String>,

    /// List every ledger event after the timing tree
    #[arg(short, long)]
    pub events: bool,

    /// Print timings, events and the final scene as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    /// Run the build command
    pub fn run(&self) -> Result<()> {
        let options = DemoOptions {
            policy: self.policy,
            fail: self.fail.clone(),
        };
        let outcome = ops::build(&options).unwrap_or_exit();

        if self.json {
            let json = serde_json::to_string_pretty(&outcome.to_json())
                .wrap_err("Failed to serialize build output")?;
            println!("{}", json);
        } else {
            outcome.summary(&options, self.events).render(&mut TerminalOutput::new());
        }

        if let Some(error) = outcome.report.outcome.err() {
            if !self.json {
                eprintln!();
                eprintln!("{:?}", miette::Report::new(error));
            }
            std::process::exit(1);
        }

        Ok(())
    }
}

fn parse_pass_name(value: &str) -> Result<String, String> {
    let names = demo::pass_names();
    if names.iter().any(|name| name == value) {
        Ok(value.to_string())
    } else {
        Err(format!("unknown pass, expected one of: {}", names.join(", ")))
    }
}
