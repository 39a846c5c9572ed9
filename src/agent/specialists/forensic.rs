//! Misconduct and violation analysis

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bullet_list, AgentInput, AgentOutput, Specialist};
use crate::agent::registry::AgentKind;
use crate::errors::ServiceError;
use crate::llm::{complete_as, CompletionService};
use crate::rag::ContextBuilder;

const SYSTEM_PROMPT: &str = r#"You are a forensic analyst specialised in banking misconduct and compliance breaches.
Decide from the evidence whether the bank breached its duties in managing the client's investments.

VIOLATION TYPES:
1. suitability - product unsuitable for the client profile, conservative client in high-risk products, lack of diversification
2. disclosure - risks not disclosed, frozen fund not disclosed, relevant facts omitted
3. fiduciary - not acting in the client's best interest, bank interest placed first, no monitoring
4. timing - allocation at an inappropriate moment, investing in an already frozen fund, no warning about adverse conditions
5. conflicts - undisclosed conflicts of interest, proprietary products pushed, fees charged on locked funds

RULES:
- Be objective and rely only on the supplied evidence.
- Always cite the specific source (document, page, date).
- Compare the bank's actions with its own rules (code of conduct, MiFID).
- Quantify the financial impact when possible.
- Assign responsibility clearly: bank, client, market, shared or undetermined.
- severity is one of: critical, grave, moderate, minor."#;

fn default_severity() -> String {
    "moderate".to_string()
}

fn default_responsibility() -> String {
    "undetermined".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViolationAnalysis {
    pub violation_found: bool,
    /// suitability, disclosure, fiduciary, timing or conflicts
    #[serde(default)]
    pub violation_type: Option<String>,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// The institution's own rules that were breached
    #[serde(default)]
    pub rules_violated: Vec<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_responsibility")]
    pub responsibility: String,
    #[serde(default)]
    pub financial_impact: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl ViolationAnalysis {
    pub fn render(&self) -> String {
        if !self.violation_found {
            return self.description.clone();
        }

        let mut out = format!(
            "**Violation identified: {}**\n\n{}\n\n",
            self.violation_type.as_deref().unwrap_or("unspecified"),
            self.description
        );
        if !self.evidence.is_empty() {
            out.push_str("**Evidence:**\n");
            out.push_str(&bullet_list(&self.evidence));
            out.push('\n');
        }
        if !self.rules_violated.is_empty() {
            out.push_str("**Rules violated:**\n");
            out.push_str(&bullet_list(&self.rules_violated));
            out.push('\n');
        }
        out.push_str(&format!("**Severity:** {}\n", self.severity));
        out.push_str(&format!("**Responsibility:** {}\n", self.responsibility));
        if let Some(impact) = &self.financial_impact {
            out.push_str(&format!("**Financial impact:** {}\n", impact));
        }
        if let Some(recommendation) = &self.recommendation {
            out.push_str(&format!("\n**Recommendation:** {}\n", recommendation));
        }
        out
    }
}

/// Works on every retrieved category, not only the formatted primary view
pub struct ForensicAgent {
    completion: Arc<dyn CompletionService>,
    builder: ContextBuilder,
    temperature: f32,
}

impl ForensicAgent {
    pub fn new(completion: Arc<dyn CompletionService>, builder: ContextBuilder) -> Self {
        Self {
            completion,
            builder,
            temperature: 0.1,
        }
    }
}

#[async_trait]
impl Specialist for ForensicAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Forensic
    }

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError> {
        let evidence = self
            .builder
            .render_categories(input.retrieval, &input.retrieval.categories());
        let analysis: ViolationAnalysis = complete_as(
            self.completion.as_ref(),
            SYSTEM_PROMPT,
            input.prompt(&evidence),
            self.temperature,
        )
        .await?;
        Ok(AgentOutput::Forensic(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_and_rendering() {
        let canned = Canned::ok(json!({
            "violation_found": true,
            "violation_type": "timing",
            "description": "Allocation into a fund frozen three months earlier.",
            "evidence": ["Fund frozen December 2008", "Allocation February 2009"]
        }));
        let agent = ForensicAgent::new(canned.clone(), ContextBuilder::new());
        let map = retrieval();
        let decision = decision(&[AgentKind::Search, AgentKind::Forensic]);
        let input = AgentInput {
            query: "Was the bank at fault?",
            retrieval: &map,
            context: "",
            decision: &decision,
        };

        let AgentOutput::Forensic(analysis) = agent.run(&input).await.unwrap() else {
            panic!("expected forensic output");
        };
        assert_eq!(analysis.severity, "moderate");
        assert_eq!(analysis.responsibility, "undetermined");

        let prompt = canned.last_user_prompt();
        assert!(prompt.contains("Global Property Fund"));
        assert!(prompt.contains("Lehman Brothers"));

        let block = analysis.render();
        assert!(block.starts_with("**Violation identified: timing**"));
        assert!(block.contains("- Fund frozen December 2008"));
        assert!(!block.contains("Financial impact"));
    }

    #[test]
    fn test_no_violation_renders_description_only() {
        let analysis = ViolationAnalysis {
            violation_found: false,
            violation_type: None,
            description: "No breach found in the documents.".to_string(),
            evidence: vec!["ignored".to_string()],
            rules_violated: vec![],
            severity: default_severity(),
            responsibility: default_responsibility(),
            financial_impact: None,
            recommendation: None,
            sources: vec![],
        };
        assert_eq!(analysis.render(), "No breach found in the documents.");
    }
}
