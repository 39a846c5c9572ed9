//! Agent layer
//!
//! Routing, specialist fan-out, consolidation and the per-query phase
//! machine that ties them together.

pub mod consolidator;
pub mod executor;
pub mod history;
pub mod knowledge;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod specialists;
pub mod state;

// Re-export commonly used types
pub use consolidator::{Consolidator, ConsolidatorConfig, SynthesisInput};
pub use executor::{AgentExecutor, AgentFailureReport, ExecutionReport, ExecutorConfig};
pub use history::{ChatTurn, HistoryWindow, Role};
pub use knowledge::{ChartSeries, ChartType, DomainKnowledge};
pub use orchestrator::{Answer, CaseAssistant};
pub use registry::AgentKind;
pub use router::{AgentRouter, Priority, RouterConfig, RoutingDecision};
pub use specialists::{AgentInput, AgentOutput, Specialist, SpecialistSet};
pub use state::{PhaseEvent, PhaseTracker, QueryPhase};
