//! Chronology of case events

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

/// Client and period material first
const EVIDENCE_ORDER: [Category; 5] = [
    Category::ClientTimeline,
    Category::HistoricalContext,
    Category::PortfolioFacts,
    Category::ForensicAnalysis,
    Category::OfficialDocs,
];

const SYSTEM_PROMPT: &str = r#"You build chronological narratives for legal cases.
Organise the events into a clear TIMELINE showing the sequence that matters for the client's case against the bank.

For every event give: a precise date (YYYY-MM-DD or YYYY-MM), a category (global, bank, client, fund),
a short title, what happened, and its impact on the client's case. Cite the source document when known.

Critical periods to cover when the documents support them:
1. Before the allocation: earlier bank scandals, the developing subprime crisis, warnings about real estate.
2. The critical moment (September - December 2008): the Lehman collapse, the bank bailout, the property fund freeze.
3. The problematic allocation (February 2009): client moved into an already frozen fund with no redemption possible.
4. The losses (2009 - 2017): gradual write-downs while fees kept being charged.

List the events in chronological order."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Global,
    Bank,
    Client,
    Fund,
    #[default]
    #[serde(other)]
    Other,
}

impl EventCategory {
    fn marker(&self) -> &'static str {
        match self {
            Self::Global => "[global]",
            Self::Bank => "[bank]",
            Self::Client => "[client]",
            Self::Fund => "[fund]",
            Self::Other => "[event]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineEvent {
    /// YYYY-MM-DD or YYYY-MM
    pub date: String,
    #[serde(default)]
    pub category: EventCategory,
    pub title: String,
    pub description: String,
    /// Impact on the case
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Timeline {
    pub title: String,
    pub period: String,
    pub summary: String,
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
    pub key_insight: String,
    #[serde(default)]
    pub pattern_detected: Option<String>,
}

impl Timeline {
    pub fn render(&self) -> String {
        let mut out = format!("**{}**\n*Period: {}*\n\n{}\n\n", self.title, self.period, self.summary);

        if !self.events.is_empty() {
            out.push_str("**Chronology:**\n\n");
            for event in &self.events {
                out.push_str(&format!(
                    "{} **{}** - {}\n   {}\n",
                    event.category.marker(),
                    event.date,
                    event.title,
                    event.description
                ));
                if !event.impact.is_empty() {
                    out.push_str(&format!("   *Impact: {}*\n", event.impact));
                }
                out.push('\n');
            }
        }

        out.push_str(&format!("\n**Key insight:** {}\n", self.key_insight));
        if let Some(pattern) = &self.pattern_detected {
            out.push_str(&format!("\n**Pattern:** {}\n", pattern));
        }
        out
    }
}

pub struct TimelineAgent {
    completion: Arc<dyn CompletionService>,
    builder: ContextBuilder,
    temperature: f32,
}

impl TimelineAgent {
    pub fn new(completion: Arc<dyn CompletionService>, builder: ContextBuilder) -> Self {
        Self {
            completion,
            builder,
            temperature: 0.2,
        }
    }
}

#[async_trait]
impl Specialist for TimelineAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Timeline
    }

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError> {
        let evidence = self.builder.render_categories(input.retrieval, &EVIDENCE_ORDER);
        let timeline: Timeline = complete_as(
            self.completion.as_ref(),
            SYSTEM_PROMPT,
            input.prompt(&evidence),
            self.temperature,
        )
        .await?;
        Ok(AgentOutput::Timeline(timeline))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_client_timeline_leads_the_evidence() {
        let canned = Canned::ok(json!({
            "title": "Portfolio 02",
            "period": "2008-2017",
            "summary": "Allocation after the freeze.",
            "events": [{
                "date": "2008-12",
                "category": "fund",
                "title": "Fund frozen",
                "description": "Redemptions suspended.",
                "impact": "No exit possible"
            }, {
                "date": "2009-02",
                "category": "ubs",
                "title": "Allocation",
                "description": "Client moved into the fund."
            }],
            "key_insight": "The freeze preceded the allocation."
        }));
        let agent = TimelineAgent::new(canned.clone(), ContextBuilder::new());
        let map = retrieval();
        let decision = decision(&[AgentKind::Search, AgentKind::Timeline]);
        let input = AgentInput {
            query: "In what order did things happen?",
            retrieval: &map,
            context: "",
            decision: &decision,
        };

        let AgentOutput::Timeline(timeline) = agent.run(&input).await.unwrap() else {
            panic!("expected timeline output");
        };
        assert_eq!(timeline.events[0].category, EventCategory::Fund);
        assert_eq!(timeline.events[1].category, EventCategory::Other);

        let prompt = canned.last_user_prompt();
        let client = prompt.find("allocation into the frozen fund").unwrap();
        let history = prompt.find("Lehman Brothers").unwrap();
        assert!(client < history);
        // primary is not part of the timeline evidence
        assert!(!prompt.contains("Global Property Fund in February"));

        let block = timeline.render();
        assert!(block.contains("[fund] **2008-12** - Fund frozen"));
        assert!(block.contains("*Impact: No exit possible*"));
        assert!(block.contains("**Key insight:** The freeze preceded the allocation."));
    }
}
