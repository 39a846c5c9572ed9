//! Historical and institutional context; only routed on explicit request

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AgentInput, AgentOutput, Specialist};
use crate::agent::registry::AgentKind;
use crate::errors::ServiceError;
use crate::llm::{complete_as, CompletionService};
use crate::rag::ContextBuilder;
use crate::store::Category;

const EVIDENCE_ORDER: [Category; 4] = [
    Category::HistoricalContext,
    Category::OfficialDocs,
    Category::ClientTimeline,
    Category::CompleteAnalysis,
];

const SYSTEM_PROMPT: &str = r#"You are a financial historian specialised in the 2008 crisis and banking scandals.
Give the HISTORICAL CONTEXT needed to understand what happened to the client's investments.

Explain:
1. What was happening in the world: the subprime crisis, the Lehman Brothers collapse (September 2008),
   panic in global real estate, property funds being frozen.
2. The bank's situation: subprime losses, the government bailout (October 2008), earlier and
   contemporary scandals, pressure to clean up the balance sheet.
3. What the bank knew or should have known: internal risk reports, the fund freeze, real estate warnings.

Tie every point back to the client's case and cite the documents. Be didactic and accessible."#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoricalEvent {
    pub date: String,
    pub title: String,
    pub description: String,
    /// Why it matters for the case
    #[serde(default)]
    pub relevance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoricalContext {
    pub period: String,
    pub summary: String,
    #[serde(default)]
    pub key_events: Vec<HistoricalEvent>,
    /// The bank's position at the time
    pub institution_situation: String,
    pub market_conditions: String,
    pub relevance_to_client: String,
    /// What the bank knew or should have known
    pub what_institution_knew: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl HistoricalContext {
    pub fn render(&self) -> String {
        let mut out = format!("**Period: {}**\n\n{}\n\n", self.period, self.summary);
        if !self.key_events.is_empty() {
            out.push_str("**Key events:**\n");
            for event in &self.key_events {
                out.push_str(&format!(
                    "- **{}**: {}\n  {}\n",
                    event.date, event.title, event.description
                ));
                if !event.relevance.is_empty() {
                    out.push_str(&format!("  *Relevance: {}*\n", event.relevance));
                }
                out.push('\n');
            }
        }
        out.push_str(&format!("**Institution:** {}\n\n", self.institution_situation));
        out.push_str(&format!("**Market conditions:** {}\n\n", self.market_conditions));
        out.push_str(&format!("**What the institution knew:** {}\n\n", self.what_institution_knew));
        out.push_str(&format!("**Impact on the client:** {}\n", self.relevance_to_client));
        out
    }
}

pub struct ContextAgent {
    completion: Arc<dyn CompletionService>,
    builder: ContextBuilder,
    temperature: f32,
}

impl ContextAgent {
    pub fn new(completion: Arc<dyn CompletionService>, builder: ContextBuilder) -> Self {
        Self {
            completion,
            builder,
            temperature: 0.3,
        }
    }
}

#[async_trait]
impl Specialist for ContextAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Context
    }

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError> {
        let evidence = self.builder.render_categories(input.retrieval, &EVIDENCE_ORDER);
        let context: HistoricalContext = complete_as(
            self.completion.as_ref(),
            SYSTEM_PROMPT,
            input.prompt(&evidence),
            self.temperature,
        )
        .await?;
        Ok(AgentOutput::Context(context))
    }
}
