//! Fixed registry of specialist agents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ForensicError;

/// Agents a query can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Evidence retrieval; always part of the flow, has no specialist
    Search,
    /// Structured financial analysis
    Analysis,
    /// Misconduct and violation analysis
    Forensic,
    /// Chronology of case events
    Timeline,
    /// Historical and institutional context (opt-in)
    Context,
    /// Visualization from fixed numeric series (opt-in)
    Chart,
    /// Arithmetic over extracted figures
    Calculation,
}

impl AgentKind {
    pub const ALL: [AgentKind; 7] = [
        AgentKind::Search,
        AgentKind::Analysis,
        AgentKind::Forensic,
        AgentKind::Timeline,
        AgentKind::Context,
        AgentKind::Chart,
        AgentKind::Calculation,
    ];

    /// Set used when routing fails
    pub const DEFAULT_SET: [AgentKind; 2] = [AgentKind::Search, AgentKind::Analysis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Analysis => "analysis",
            Self::Forensic => "forensic",
            Self::Timeline => "timeline",
            Self::Context => "context",
            Self::Chart => "chart",
            Self::Calculation => "calculation",
        }
    }

    /// Block label used in the synthesis prompt
    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }

    /// Only activated by explicit user intent
    pub fn is_opt_in(&self) -> bool {
        matches!(self, Self::Context | Self::Chart)
    }

    /// Runs a specialist during fan-out
    pub fn is_specialist(&self) -> bool {
        !matches!(self, Self::Search)
    }

    /// Needs the tertiary categories in the retrieval map
    pub fn needs_tertiary(&self) -> bool {
        matches!(self, Self::Context | Self::Timeline)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = ForensicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        AgentKind::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| ForensicError::InvalidInput(format!("Unknown agent: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_lenient_on_case_and_space() {
        assert_eq!(" Forensic ".parse::<AgentKind>().unwrap(), AgentKind::Forensic);
        assert!("oracle".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_opt_in_agents() {
        let opt_in: Vec<AgentKind> = AgentKind::ALL.into_iter().filter(|a| a.is_opt_in()).collect();
        assert_eq!(opt_in, vec![AgentKind::Context, AgentKind::Chart]);
    }

    #[test]
    fn test_default_set_contains_baseline() {
        assert!(AgentKind::DEFAULT_SET.contains(&AgentKind::Search));
        assert!(!AgentKind::Search.is_specialist());
    }
}
