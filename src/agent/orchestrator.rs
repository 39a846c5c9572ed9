//! Case assistant - main coordinator
//!
//! Drives one query through the phase machine:
//! - Routing: pick the agent set (never fails, falls back to defaults)
//! - Retrieving: run the category cascade (fatal on store failure)
//! - Executing: fan out to the routed specialists (failures absorbed)
//! - Consolidating: synthesize the final answer (fatal on failure)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument};

use super::consolidator::{Consolidator, ConsolidatorConfig, SynthesisInput};
use super::executor::{AgentExecutor, AgentFailureReport};
use super::history::ChatTurn;
use super::knowledge::DomainKnowledge;
use super::registry::AgentKind;
use super::router::{AgentRouter, RoutingDecision};
use super::specialists::{AgentInput, SpecialistSet};
use super::state::{PhaseEvent, PhaseTracker, QueryPhase};
use crate::config::Config;
use crate::errors::{ForensicError, Result};
use crate::llm::CompletionService;
use crate::rag::{ContextBuilder, HierarchicalRetriever, RerankStage, RetrievalPolicy, SourceRef};
use crate::store::{CategoryRegistry, ChunkStore};

/// Final result of one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Deduplicated citations, first-seen order
    pub sources: Vec<SourceRef>,
    /// Routed agent set
    pub agents_used: Vec<AgentKind>,
    pub failed_agents: Vec<AgentFailureReport>,
    /// Structured output per succeeded agent; chart payloads verbatim
    pub extras: BTreeMap<String, Value>,
    pub routing: RoutingDecision,
    pub phases: Vec<QueryPhase>,
}

impl Answer {
    pub fn chart(&self) -> Option<&Value> {
        self.extras.get(AgentKind::Chart.as_str())
    }
}

/// Answering core
pub struct CaseAssistant {
    router: AgentRouter,
    retriever: HierarchicalRetriever,
    builder: ContextBuilder,
    executor: AgentExecutor,
    consolidator: Consolidator,
    policy: RetrievalPolicy,
}

impl CaseAssistant {
    pub fn new(
        router: AgentRouter,
        retriever: HierarchicalRetriever,
        executor: AgentExecutor,
        consolidator: Consolidator,
    ) -> Self {
        Self {
            router,
            retriever,
            builder: ContextBuilder::new(),
            executor,
            consolidator,
            policy: RetrievalPolicy::default(),
        }
    }

    /// Wire the standard components from configuration
    pub fn assemble(
        completion: Arc<dyn CompletionService>,
        store: ChunkStore,
        reranker: RerankStage,
        knowledge: Arc<DomainKnowledge>,
        config: &Config,
    ) -> Self {
        let builder = ContextBuilder::with_config(config.context.rendering.clone());
        let history = config.context.history;

        let router = AgentRouter::new(completion.clone())
            .with_config(config.agents.router.clone())
            .with_history_window(history);
        let retriever = HierarchicalRetriever::new(store, reranker, CategoryRegistry::forensic())
            .with_tuning(config.retrieval.tuning);
        let executor = AgentExecutor::new(SpecialistSet::standard(
            completion.clone(),
            knowledge.clone(),
            builder.clone(),
        ))
        .with_config(config.agents.executor.clone());
        let consolidator = Consolidator::new(completion, knowledge)
            .with_history_window(history)
            .with_config(ConsolidatorConfig {
                temperature: config.agents.consolidation_temperature,
            });

        Self::new(router, retriever, executor, consolidator)
            .with_context_builder(builder)
            .with_policy(config.retrieval.policy())
    }

    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retriever(&self) -> &HierarchicalRetriever {
        &self.retriever
    }

    /// Answer `query`; prior turns only inform routing and synthesis
    pub async fn answer(&self, query: &str, history: &[ChatTurn]) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ForensicError::InvalidInput("Query must not be empty".to_string()));
        }
        self.policy.validate()?;

        let span = info_span!("answer", query_chars = query.chars().count());
        self.run(query, history).instrument(span).await
    }

    /// `answer` bounded by a deadline; in-flight calls are dropped when it elapses
    pub async fn answer_within(
        &self,
        deadline: Duration,
        query: &str,
        history: &[ChatTurn],
    ) -> Result<Answer> {
        match tokio::time::timeout(deadline, self.answer(query, history)).await {
            Ok(result) => result,
            Err(_) => {
                let duration_ms = deadline.as_millis() as u64;
                error!(duration_ms, "Query deadline elapsed");
                Err(ForensicError::Timeout { duration_ms })
            }
        }
    }

    async fn run(&self, query: &str, history: &[ChatTurn]) -> Result<Answer> {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();

        let decision = self.router.route(query, history).await;
        tracker.advance(PhaseEvent::Routed)?;

        let policy = self.policy.with_tertiary(decision.include_tertiary());
        let retrieval = match self.retriever.retrieve(query, &policy).await {
            Ok(map) => map,
            Err(e) => return Err(fail(&mut tracker, e)),
        };
        tracker.advance(PhaseEvent::Retrieved)?;

        let context = self.builder.format(&retrieval);
        let sources = self.builder.extract_sources(&retrieval);

        let input = AgentInput {
            query,
            retrieval: &retrieval,
            context: &context,
            decision: &decision,
        };
        let report = self.executor.execute(&input).await;
        tracker.advance(PhaseEvent::AgentsSettled)?;

        let synthesis = SynthesisInput {
            query,
            decision: &decision,
            report: &report,
            context: &context,
            history,
        };
        let text = match self.consolidator.consolidate(&synthesis).await {
            Ok(text) => text,
            Err(e) => return Err(fail(&mut tracker, e)),
        };
        tracker.advance(PhaseEvent::Consolidated)?;

        let extras: BTreeMap<String, Value> = report
            .outputs
            .iter()
            .map(|o| (o.kind().as_str().to_string(), o.to_json()))
            .collect();

        info!(
            agents = ?decision.agents,
            failed = report.failures.len(),
            sources = sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(Answer {
            text,
            sources,
            agents_used: decision.agents.clone(),
            failed_agents: report.failures,
            extras,
            routing: decision,
            phases: tracker.history().to_vec(),
        })
    }
}

/// Move the query to `Error` and hand back the cause
fn fail(tracker: &mut PhaseTracker, err: ForensicError) -> ForensicError {
    let phase = tracker.current();
    if let Err(transition) = tracker.advance(PhaseEvent::Failed) {
        error!(error = %transition, "Phase machine rejected failure");
    }
    error!(phase = ?phase, error = %err, "Query failed");
    err
}
