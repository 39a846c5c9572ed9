//! Structured financial analysis over the formatted case context

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bullet_list, AgentInput, AgentOutput, Specialist};
use crate::agent::registry::AgentKind;
use crate::errors::ServiceError;
use crate::llm::{complete_as, CompletionService};

const SYSTEM_PROMPT: &str = "You are a financial analyst reviewing an investment case. \
Answer from the documents only: performance, allocation, losses, withdrawals and amounts. \
Cite the source document of every figure. The PRIMARY SOURCE section is authoritative; \
complementary data only fills gaps. State total_amount in EUR when the question asks for a sum, \
otherwise 0. confidence is between 0 and 1.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialAnalysis {
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Total in EUR, 0 when not applicable
    #[serde(default)]
    pub total_amount: f64,
    /// 0.0 - 1.0
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub recommendation: String,
}

impl FinancialAnalysis {
    pub fn render(&self) -> String {
        let mut out = format!("{}\n\n", self.summary);
        if !self.key_findings.is_empty() {
            out.push_str("**Key findings:**\n");
            out.push_str(&bullet_list(&self.key_findings));
            out.push('\n');
        }
        if self.total_amount != 0.0 {
            out.push_str(&format!("**Total amount:** EUR {:.2}\n", self.total_amount));
        }
        if !self.recommendation.is_empty() {
            out.push_str(&format!("\n**Recommendation:** {}\n", self.recommendation));
        }
        out
    }
}

pub struct AnalysisAgent {
    completion: Arc<dyn CompletionService>,
    temperature: f32,
}

impl AnalysisAgent {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            temperature: 0.1,
        }
    }
}

#[async_trait]
impl Specialist for AnalysisAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Analysis
    }

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError> {
        let mut analysis: FinancialAnalysis = complete_as(
            self.completion.as_ref(),
            SYSTEM_PROMPT,
            input.prompt(input.context),
            self.temperature,
        )
        .await?;
        analysis.confidence = analysis.confidence.clamp(0.0, 1.0);
        Ok(AgentOutput::Analysis(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_uses_formatted_context_and_clamps_confidence() {
        let canned = Canned::ok(json!({
            "summary": "Wealth fell from EUR 1.31M to EUR 229.7K.",
            "key_findings": ["Withdrawals explain most of the decline"],
            "total_amount": 1133600.0,
            "confidence": 1.7
        }));
        let agent = AnalysisAgent::new(canned.clone());
        let map = retrieval();
        let decision = decision(&[AgentKind::Search, AgentKind::Analysis]);
        let input = AgentInput {
            query: "How much was withdrawn?",
            retrieval: &map,
            context: "FORMATTED CONTEXT",
            decision: &decision,
        };

        let AgentOutput::Analysis(analysis) = agent.run(&input).await.unwrap() else {
            panic!("expected analysis output");
        };
        assert_eq!(analysis.confidence, 1.0);
        assert!(canned.last_user_prompt().contains("FORMATTED CONTEXT"));

        let block = analysis.render();
        assert!(block.contains("- Withdrawals explain most of the decline"));
        assert!(block.contains("EUR 1133600.00"));
    }

    #[tokio::test]
    async fn test_schema_violation_is_reported() {
        let agent = AnalysisAgent::new(Canned::ok(json!({"key_findings": "not a list"})));
        let map = retrieval();
        let decision = decision(&[AgentKind::Analysis]);
        let input = AgentInput {
            query: "q",
            retrieval: &map,
            context: "",
            decision: &decision,
        };
        let err = agent.run(&input).await.unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }
}
