//! Report data structures for commands.
//!
//! This module provides data structures that separate data collection from rendering.
//! Commands build reports, then render them to an Output target.

mod build;
mod check;
mod output;
mod plan;

pub use build::{BuildSummary, describe_event};
pub use check::CheckReport;
pub use output::{Report, TerminalOutput};
pub use plan::PlanReport;
