mod build;
mod check;
mod completions;
mod plan;

use build::BuildCommand;
use check::CheckCommand;
use clap::{Parser, Subcommand};
use completions::CompletionsCommand;
use eyre::Result;
use kiln_pipeline::ResolveError;
use plan::PlanCommand;

/// Extension trait for exiting on resolution errors with pretty formatting
pub(crate) trait UnwrapOrExit<T> {
    fn unwrap_or_exit(self) -> T;
}

impl<T> UnwrapOrExit<T> for Result<T, ResolveError> {
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("{:?}", miette::Report::new(e));
                std::process::exit(1);
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(about = "Resolve and run plugin build pipelines")]
pub(crate) struct Cli {
    /// Log pipeline internals at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Plan(cmd) => cmd.run(),
            Commands::Check(cmd) => cmd.run(),
            Commands::Build(cmd) => cmd.run(),
            Commands::Completions(cmd) => cmd.run(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved pass order of the demo pipeline
    Plan(PlanCommand),

    /// Resolve the demo pipeline and report diagnostics
    Check(CheckCommand),

    /// Run the demo pipeline on the sample scene
    Build(BuildCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}
