//! Specialist agents
//!
//! Each specialist is one structured completion call (the calculation and
//! chart agents add a local step) returning a typed output. Outputs render to
//! labeled Markdown blocks for the synthesis prompt; the chart output never
//! does and is passed through to the caller unchanged.

pub mod analysis;
pub mod calculation;
pub mod chart;
pub mod context;
pub mod expr;
pub mod forensic;
pub mod timeline;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::knowledge::DomainKnowledge;
use super::registry::AgentKind;
use super::router::RoutingDecision;
use crate::errors::ServiceError;
use crate::llm::CompletionService;
use crate::rag::context::NO_DOCUMENTS;
use crate::rag::{ContextBuilder, RetrievalMap};

pub use analysis::{AnalysisAgent, FinancialAnalysis};
pub use calculation::{CalculationAgent, CalculationRequest, CalculationResult};
pub use chart::{ChartAgent, ChartData, ChartSpecification};
pub use context::{ContextAgent, HistoricalContext, HistoricalEvent};
pub use forensic::{ForensicAgent, ViolationAnalysis};
pub use timeline::{EventCategory, Timeline, TimelineAgent, TimelineEvent};

/// Shared, read-only view handed to every specialist of one query
#[derive(Debug, Clone, Copy)]
pub struct AgentInput<'a> {
    pub query: &'a str,
    pub retrieval: &'a RetrievalMap,
    /// Formatted context (primary first, complementary after)
    pub context: &'a str,
    pub decision: &'a RoutingDecision,
}

impl<'a> AgentInput<'a> {
    /// User prompt: question, response language, evidence
    pub fn prompt(&self, evidence: &str) -> String {
        let evidence = if evidence.trim().is_empty() {
            NO_DOCUMENTS
        } else {
            evidence
        };
        format!(
            "Question: {}\nRespond in language: {}\n\nDOCUMENTS:\n{}",
            self.query, self.decision.language, evidence
        )
    }
}

#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError>;
}

/// Typed result of one specialist
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentOutput {
    Analysis(FinancialAnalysis),
    Forensic(ViolationAnalysis),
    Timeline(Timeline),
    Context(HistoricalContext),
    Chart(ChartSpecification),
    Calculation(CalculationResult),
}

impl AgentOutput {
    pub fn kind(&self) -> AgentKind {
        match self {
            Self::Analysis(_) => AgentKind::Analysis,
            Self::Forensic(_) => AgentKind::Forensic,
            Self::Timeline(_) => AgentKind::Timeline,
            Self::Context(_) => AgentKind::Context,
            Self::Chart(_) => AgentKind::Chart,
            Self::Calculation(_) => AgentKind::Calculation,
        }
    }

    /// Markdown block for the synthesis prompt; `None` for chart output
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Analysis(a) => Some(a.render()),
            Self::Forensic(f) => Some(f.render()),
            Self::Timeline(t) => Some(t.render()),
            Self::Context(c) => Some(c.render()),
            Self::Calculation(c) => Some(c.render()),
            Self::Chart(_) => None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Chart(_))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Specialists available to the executor, keyed by agent
#[derive(Clone, Default)]
pub struct SpecialistSet {
    agents: HashMap<AgentKind, Arc<dyn Specialist>>,
}

impl SpecialistSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full production set sharing one completion provider
    pub fn standard(
        completion: Arc<dyn CompletionService>,
        knowledge: Arc<DomainKnowledge>,
        builder: ContextBuilder,
    ) -> Self {
        Self::new()
            .with(AnalysisAgent::new(completion.clone()))
            .with(ForensicAgent::new(completion.clone(), builder.clone()))
            .with(TimelineAgent::new(completion.clone(), builder.clone()))
            .with(ContextAgent::new(completion.clone(), builder))
            .with(ChartAgent::new(completion.clone(), knowledge))
            .with(CalculationAgent::new(completion))
    }

    /// Register (or replace) the specialist for its kind
    pub fn with(mut self, specialist: impl Specialist + 'static) -> Self {
        self.agents.insert(specialist.kind(), Arc::new(specialist));
        self
    }

    pub fn with_arc(mut self, specialist: Arc<dyn Specialist>) -> Self {
        self.agents.insert(specialist.kind(), specialist);
        self
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn Specialist>> {
        self.agents.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// "- item" lines
pub(crate) fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("- {}\n", item)).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::agent::router::Priority;
    use crate::llm::CompletionRequest;
    use crate::store::{Category, ChunkRecord, ScoredChunk, SearchResult};
    use std::sync::Mutex;

    /// Replies with a fixed value and records every request
    pub struct Canned {
        reply: Result<Value, ServiceError>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Canned {
        pub fn ok(value: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(value),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn err(error: ServiceError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn last_user_prompt(&self) -> String {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|r| r.user.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionService for Canned {
        async fn complete(&self, request: &CompletionRequest) -> Result<Value, ServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    pub fn decision(agents: &[AgentKind]) -> RoutingDecision {
        RoutingDecision {
            agents: agents.to_vec(),
            priority: Priority::Medium,
            reasoning: String::new(),
            parallel: true,
            language: "en".to_string(),
            is_emotional: false,
            needs_next_steps: false,
            fallback: false,
        }
    }

    pub fn retrieval() -> RetrievalMap {
        let chunk = |category, source: &str, content: &str| {
            ScoredChunk::new(ChunkRecord::new(category, source, content), 0.2)
        };
        let mut map = RetrievalMap::new(
            Category::CompleteAnalysis,
            SearchResult::new(vec![chunk(
                Category::CompleteAnalysis,
                "case_analysis.md",
                "Portfolio 02 was moved into the Global Property Fund in February 2009.",
            )]),
            false,
        );
        map.insert(
            Category::ClientTimeline,
            SearchResult::new(vec![chunk(
                Category::ClientTimeline,
                "client_timeline.md",
                "2009-02: allocation into the frozen fund.",
            )]),
        );
        map.insert(
            Category::HistoricalContext,
            SearchResult::new(vec![chunk(
                Category::HistoricalContext,
                "crisis_2008.md",
                "Lehman Brothers collapsed in September 2008.",
            )]),
        );
        map
    }
}
