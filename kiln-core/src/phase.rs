use std::{fmt, str::FromStr};

use serde::Serialize;

/// A top-level stage of the build pipeline.
///
/// Phases are totally ordered by declaration order; every pass of an earlier
/// phase runs before any pass of a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolving,
    Generating,
    Transforming,
    Optimizing,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::Resolving,
        Phase::Generating,
        Phase::Transforming,
        Phase::Optimizing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Resolving => "Resolving",
            Phase::Generating => "Generating",
            Phase::Transforming => "Transforming",
            Phase::Optimizing => "Optimizing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePhaseError(String);

impl fmt::Display for ParsePhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown phase '{}', expected one of: resolving, generating, transforming, optimizing",
            self.0
        )
    }
}

impl std::error::Error for ParsePhaseError {}

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_ordered() {
        assert!(Phase::Resolving < Phase::Generating);
        assert!(Phase::Generating < Phase::Transforming);
        assert!(Phase::Transforming < Phase::Optimizing);

        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("transforming".parse::<Phase>(), Ok(Phase::Transforming));
        assert_eq!("OPTIMIZING".parse::<Phase>(), Ok(Phase::Optimizing));
        assert!("linking".parse::<Phase>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for phase in Phase::ALL {
            assert_eq!(phase.to_string().parse::<Phase>(), Ok(phase));
        }
    }

    #[test]
    fn test_serialize_snake_case() {
        let json = serde_json::to_string(&Phase::Transforming).unwrap();
        assert_eq!(json, "\"transforming\"");
    }
}
