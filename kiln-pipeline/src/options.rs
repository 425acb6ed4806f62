//! Execution options.

use std::{fmt, str::FromStr};

use serde::Serialize;

/// How long extension contexts stay active between passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextPolicy {
    /// Keep a context active across a contiguous run of passes that require
    /// or tolerate it.
    #[default]
    Lookahead,
    /// Activate required contexts before each pass and deactivate them after.
    PerPass,
}

impl fmt::Display for ContextPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextPolicy::Lookahead => f.write_str("lookahead"),
            ContextPolicy::PerPass => f.write_str("per-pass"),
        }
    }
}

impl FromStr for ContextPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lookahead" => Ok(ContextPolicy::Lookahead),
            "per-pass" => Ok(ContextPolicy::PerPass),
            other => Err(format!(
                "unknown context policy '{}', expected 'lookahead' or 'per-pass'",
                other
            )),
        }
    }
}

/// Options for [`Pipeline::execute`](crate::Pipeline::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub context_policy: ContextPolicy,
    /// Turn panics in pass bodies and context hooks into build failures.
    pub catch_panics: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            context_policy: ContextPolicy::default(),
            catch_panics: true,
        }
    }
}

impl ExecutionOptions {
    pub fn context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = policy;
        self
    }

    pub fn catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}
