//! Per-query phase machine
//!
//! Routing -> Retrieving -> Executing -> Consolidating -> Done, with Error
//! reachable from every non-terminal phase. Agent failures do not move the
//! query to Error; they are absorbed per agent during Executing.

use crate::errors::{ForensicError, Result};
use serde::{Deserialize, Serialize};

/// Query phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryPhase {
    /// Choosing the agent set
    Routing,

    /// Running the category cascade
    Retrieving,

    /// Fan-out to specialist agents
    Executing,

    /// Final synthesis
    Consolidating,

    /// Answer produced (terminal)
    Done,

    /// Query failed (terminal)
    Error,
}

/// Events that drive phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Routing decision available (model or fallback)
    Routed,

    /// Retrieval map built
    Retrieved,

    /// Every selected agent finished or failed
    AgentsSettled,

    /// Final answer synthesized
    Consolidated,

    /// Fatal failure (retrieval, consolidation, deadline)
    Failed,
}

impl Default for QueryPhase {
    fn default() -> Self {
        QueryPhase::Routing
    }
}

impl QueryPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryPhase::Done | QueryPhase::Error)
    }

    /// Next phase, or `InvalidTransition`
    pub fn transition(&self, event: PhaseEvent) -> Result<QueryPhase> {
        use PhaseEvent::*;
        use QueryPhase::*;

        let next = match (self, event) {
            (Routing, Routed) => Retrieving,
            (Retrieving, Retrieved) => Executing,
            (Executing, AgentsSettled) => Consolidating,
            (Consolidating, Consolidated) => Done,
            (from, Failed) if !from.is_terminal() => Error,
            (from, event) => {
                return Err(ForensicError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Events accepted in this phase
    pub fn valid_events(&self) -> Vec<PhaseEvent> {
        use PhaseEvent::*;
        use QueryPhase::*;

        match self {
            Routing => vec![Routed, Failed],
            Retrieving => vec![Retrieved, Failed],
            Executing => vec![AgentsSettled, Failed],
            Consolidating => vec![Consolidated, Failed],
            Done | Error => vec![],
        }
    }
}

/// Tracks the phase of one query and records the path taken
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: QueryPhase,
    history: Vec<QueryPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: QueryPhase::Routing,
            history: vec![QueryPhase::Routing],
        }
    }

    pub fn current(&self) -> QueryPhase {
        self.current
    }

    pub fn history(&self) -> &[QueryPhase] {
        &self.history
    }

    pub fn advance(&mut self, event: PhaseEvent) -> Result<QueryPhase> {
        let next = self.current.transition(event)?;
        self.current = next;
        self.history.push(next);
        Ok(next)
    }
}
