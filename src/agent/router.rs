//! Query routing: which specialist agents handle a question
//!
//! One structured completion picks the agent set. The result is then
//! normalized: unknown names are dropped, `search` is always present, and
//! opt-in agents (context, chart) are kept only when the query explicitly
//! asks for them. A failed routing call falls back to the default set.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::history::{ChatTurn, HistoryWindow};
use super::registry::AgentKind;
use crate::errors::ForensicError;
use crate::llm::{complete_as, CompletionService};

/// Phrases that explicitly request historical context
pub const CONTEXT_KEYWORDS: &[&str] = &[
    "historical context",
    "what was happening at the time",
    "what was happening in the world",
    "2008 crisis",
    "crisis of 2008",
    "why did the market fall",
    "why the market fell",
    "contexto histórico",
    "contexto historico",
    "o que acontecia na época",
    "o que acontecia na epoca",
    "crise de 2008",
    "por que o mercado caiu",
    "o que estava acontecendo no mundo",
];

/// Phrases that explicitly request a visualization
pub const CHART_KEYWORDS: &[&str] = &[
    "chart",
    "charts",
    "graph",
    "graphs",
    "plot",
    "visualize",
    "visualise",
    "visualization",
    "wealth evolution",
    "withdrawals per year",
    "annual returns",
    "compare the portfolios",
    "gráfico",
    "grafico",
    "gráficos",
    "graficos",
    "visualizar",
    "evolução patrimonial",
    "evolução do patrimônio",
    "saques por ano",
    "retiradas por ano",
    "retornos anuais",
    "performance anual",
    "compare os portfolios",
];

const EMOTIONAL_KEYWORDS: &[&str] = &[
    "robbed",
    "cheated",
    "deceived",
    "angry",
    "frustrated",
    "unfair",
    "outrageous",
    "roubado",
    "enganado",
    "raiva",
    "frustração",
    "injusto",
    "absurdo",
    "revoltado",
    "decepcionado",
];

const NEXT_STEPS_KEYWORDS: &[&str] = &[
    "what should i do",
    "next steps",
    "how to proceed",
    "can i sue",
    "what do you recommend",
    "o que fazer",
    "próximos passos",
    "proximos passos",
    "como proceder",
    "posso processar",
    "tenho direito",
    "o que você sugere",
];

const ROUTING_PROMPT: &str = r#"You route questions in a forensic investment-portfolio case against a bank.
Choose the agents that should answer the user's question.

TOP PRIORITY: focus on the case documents and data. Use historical context ONLY when the user explicitly asks for it.

AVAILABLE AGENTS:
1. search - semantic search over case documents. ALWAYS include.
2. analysis - structured financial analysis (performance, allocation, losses, amounts). Preferred.
3. forensic - misconduct and violations (responsibility, fault, breaches, bank errors). Preferred.
4. chart - visualization. ONLY when the question explicitly asks for a chart, graph, wealth evolution, withdrawals per year, annual returns or a portfolio comparison.
5. calculation - specific arithmetic: percentages, totals, differences.
6. context - historical context. ONLY when the user explicitly asks what was happening at the time, about the 2008 crisis, or why the market fell.
7. timeline - chronology and order of events.

ROUTING RULES:
- data, values, performance -> ["search", "analysis"]
- responsibility, fault, violations -> ["search", "forensic"]
- general case questions ("what happened?") -> ["search", "analysis"]
- sequence of events, chronology -> ["search", "timeline"]
- historical context (only if explicitly requested) -> ["search", "context"]
- visualization (only if requested) -> ["search", "analysis", "chart"]
- add "calculation" when arithmetic is needed

Set is_emotional when the question expresses frustration, anger or distress.
Set needs_next_steps when the user asks what to do now, how to proceed, or for a recommendation.
Set language to the ISO code of the user's language.
Never add "context" or "chart" unless the user explicitly asked."#;

/// Urgency reported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" | "alta" => Priority::High,
            "low" | "baixa" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

/// Shape requested from the routing completion
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RouteChoice {
    /// Agents to use: search, analysis, chart, calculation, forensic, context, timeline
    pub agents: Vec<String>,
    /// high, medium or low
    #[serde(default)]
    pub priority: String,
    /// Short explanation of the choice
    #[serde(default)]
    pub reasoning: String,
    /// Whether the agents can run in parallel
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Response language (ISO code)
    #[serde(default)]
    pub language: String,
    /// Question expresses emotion or frustration
    #[serde(default)]
    pub is_emotional: bool,
    /// Answer should include next steps
    #[serde(default)]
    pub needs_next_steps: bool,
}

fn default_true() -> bool {
    true
}

/// Routing outcome for one query; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Non-empty, deduplicated, `search` first
    pub agents: Vec<AgentKind>,
    pub priority: Priority,
    /// Audit text only; never parsed
    pub reasoning: String,
    /// Advisory
    pub parallel: bool,
    pub language: String,
    pub is_emotional: bool,
    pub needs_next_steps: bool,
    /// True when the default set replaced a failed routing call
    pub fallback: bool,
}

impl RoutingDecision {
    pub fn includes(&self, agent: AgentKind) -> bool {
        self.agents.contains(&agent)
    }

    /// Agents that run a specialist during fan-out
    pub fn specialists(&self) -> Vec<AgentKind> {
        self.agents.iter().copied().filter(AgentKind::is_specialist).collect()
    }

    /// Whether retrieval should search the tertiary tier
    pub fn include_tertiary(&self) -> bool {
        self.agents.iter().any(AgentKind::needs_tertiary)
    }
}

/// Router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Set used when the routing call fails
    pub default_agents: Vec<AgentKind>,
    /// Language assumed when the model does not report one
    pub default_language: String,
    pub temperature: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_agents: AgentKind::DEFAULT_SET.to_vec(),
            default_language: "pt".to_string(),
            temperature: 0.1,
        }
    }
}

/// Agent router
#[derive(Clone)]
pub struct AgentRouter {
    completion: Arc<dyn CompletionService>,
    config: RouterConfig,
    history: HistoryWindow,
}

impl AgentRouter {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            config: RouterConfig::default(),
            history: HistoryWindow::default(),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.history = window;
        self
    }

    /// Decide the agent set; always returns at least one agent
    pub async fn route(&self, query: &str, history: &[ChatTurn]) -> RoutingDecision {
        let mut user = format!("User question: {}", query);
        if let Some(block) = self.history.render(history) {
            user = format!("{}\n{}", block, user);
        }

        let decision = match complete_as::<RouteChoice>(
            self.completion.as_ref(),
            ROUTING_PROMPT,
            user,
            self.config.temperature,
        )
        .await
        {
            Ok(choice) => self.from_choice(choice),
            Err(e) => {
                let err = ForensicError::RoutingFailure(e);
                warn!(error = %err, "Routing failed, using default agent set");
                self.fallback(query)
            }
        };

        let decision = apply_opt_in_gate(decision, query);
        info!(
            agents = ?decision.agents,
            fallback = decision.fallback,
            priority = ?decision.priority,
            "Routed query"
        );
        decision
    }

    fn from_choice(&self, choice: RouteChoice) -> RoutingDecision {
        let mut agents = Vec::with_capacity(choice.agents.len() + 1);
        for name in &choice.agents {
            match name.parse::<AgentKind>() {
                Ok(agent) if !agents.contains(&agent) => agents.push(agent),
                Ok(_) => {}
                Err(_) => debug!(agent = %name, "Ignoring unknown agent from router"),
            }
        }

        let language = if choice.language.trim().is_empty() {
            self.config.default_language.clone()
        } else {
            choice.language.trim().to_lowercase()
        };

        RoutingDecision {
            agents,
            priority: Priority::parse_lenient(&choice.priority),
            reasoning: choice.reasoning,
            parallel: choice.parallel,
            language,
            is_emotional: choice.is_emotional,
            needs_next_steps: choice.needs_next_steps,
            fallback: false,
        }
    }

    fn fallback(&self, query: &str) -> RoutingDecision {
        let agents = if self.config.default_agents.is_empty() {
            AgentKind::DEFAULT_SET.to_vec()
        } else {
            self.config.default_agents.clone()
        };

        RoutingDecision {
            agents,
            priority: Priority::Medium,
            reasoning: "Routing unavailable; default agent set".to_string(),
            parallel: true,
            language: self.config.default_language.clone(),
            is_emotional: matches_any(query, EMOTIONAL_KEYWORDS),
            needs_next_steps: matches_any(query, NEXT_STEPS_KEYWORDS),
            fallback: true,
        }
    }
}

/// Case-insensitive match of whole words or whole phrases
pub fn matches_any(query: &str, keywords: &[&str]) -> bool {
    let query_words = words(query);
    keywords.iter().any(|keyword| {
        let phrase = words(keyword);
        !phrase.is_empty() && query_words.windows(phrase.len()).any(|w| w == phrase.as_slice())
    })
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether the query explicitly asks for an opt-in agent
pub fn explicitly_requested(agent: AgentKind, query: &str) -> bool {
    match agent {
        AgentKind::Context => matches_any(query, CONTEXT_KEYWORDS),
        AgentKind::Chart => matches_any(query, CHART_KEYWORDS),
        _ => true,
    }
}

/// Keep opt-in agents only on explicit intent, add them when it is present,
/// and make sure `search` leads the set
fn apply_opt_in_gate(mut decision: RoutingDecision, query: &str) -> RoutingDecision {
    decision.agents.retain(|agent| {
        let keep = !agent.is_opt_in() || explicitly_requested(*agent, query);
        if !keep {
            debug!(agent = %agent, "Dropping opt-in agent without explicit request");
        }
        keep
    });

    for agent in [AgentKind::Context, AgentKind::Chart] {
        if explicitly_requested(agent, query) && !decision.agents.contains(&agent) {
            decision.agents.push(agent);
        }
    }

    decision.agents.retain(|a| *a != AgentKind::Search);
    decision.agents.insert(0, AgentKind::Search);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Scripted(std::result::Result<Value, ServiceError>);

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<Value, ServiceError> {
            self.0.clone()
        }
    }

    fn router(reply: std::result::Result<Value, ServiceError>) -> AgentRouter {
        AgentRouter::new(Arc::new(Scripted(reply)))
    }

    #[tokio::test]
    async fn test_failed_call_falls_back_to_default_set() {
        let decision = router(Err(ServiceError::Timeout { duration_ms: 10 }))
            .route("How much was withdrawn?", &[])
            .await;
        assert!(decision.fallback);
        assert_eq!(decision.agents, vec![AgentKind::Search, AgentKind::Analysis]);
    }

    #[tokio::test]
    async fn test_schema_mismatch_falls_back() {
        let decision = router(Ok(json!({"agents": "analysis"})))
            .route("What happened?", &[])
            .await;
        assert!(decision.fallback);
        assert!(!decision.agents.is_empty());
    }

    #[tokio::test]
    async fn test_context_dropped_without_keyword() {
        let decision = router(Ok(json!({
            "agents": ["search", "analysis", "context"],
            "priority": "High",
            "reasoning": "general question"
        })))
        .route("what happened?", &[])
        .await;
        assert!(!decision.includes(AgentKind::Context));
        assert_eq!(decision.priority, Priority::High);
    }

    #[tokio::test]
    async fn test_context_added_on_explicit_keyword() {
        let decision = router(Ok(json!({"agents": ["search", "analysis"]})))
            .route("what is the historical context of the 2008 crisis?", &[])
            .await;
        assert!(decision.includes(AgentKind::Context));
        assert!(decision.include_tertiary());
    }

    #[tokio::test]
    async fn test_unknown_agents_dropped_and_search_first() {
        let decision = router(Ok(json!({"agents": ["forensic", "oracle", "forensic"]})))
            .route("Was the bank at fault?", &[])
            .await;
        assert_eq!(decision.agents, vec![AgentKind::Search, AgentKind::Forensic]);
        assert_eq!(decision.specialists(), vec![AgentKind::Forensic]);
        assert_eq!(decision.language, "pt");
    }

    #[tokio::test]
    async fn test_fallback_detects_emotion_and_next_steps() {
        let decision = router(Err(ServiceError::ProviderUnavailable("down".into())))
            .route("Me sinto roubado. O que fazer agora?", &[])
            .await;
        assert!(decision.is_emotional);
        assert!(decision.needs_next_steps);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        assert!(!explicitly_requested(AgentKind::Chart, "Did the fee charter allow this?"));
        assert!(explicitly_requested(AgentKind::Chart, "Plot the charts, please"));
        assert!(!explicitly_requested(
            AgentKind::Context,
            "What was my balance at the time of the transfer?"
        ));
        assert!(!explicitly_requested(
            AgentKind::Context,
            "Quanto eu tinha na época da transferência?"
        ));
        assert!(explicitly_requested(
            AgentKind::Context,
            "O que acontecia na época da crise?"
        ));
        assert!(matches_any("What should I do now?", NEXT_STEPS_KEYWORDS));
    }

    #[test]
    fn test_chart_keywords_portuguese() {
        assert!(explicitly_requested(AgentKind::Chart, "Mostre um gráfico dos saques por ano"));
        assert!(!explicitly_requested(AgentKind::Chart, "Qual foi a perda?"));
    }
}
