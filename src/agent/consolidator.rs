//! Final answer synthesis
//!
//! With at least one rendered agent block, the blocks are merged with the
//! fixed domain knowledge and the conversation history in one completion.
//! With none, the answer is synthesized directly from the retrieved context.
//! Either way a failed or empty synthesis is a `ConsolidationFailure`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::executor::ExecutionReport;
use super::history::{ChatTurn, HistoryWindow};
use super::knowledge::DomainKnowledge;
use super::router::RoutingDecision;
use super::specialists::AgentOutput;
use crate::errors::{ForensicError, Result, ServiceError};
use crate::llm::{complete_as, CompletionService};

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_PROMPT: &str = "You answer questions about a legal case against a bank using \
FINANCIAL DOCUMENTS. Focus on data, amounts, dates and concrete facts. Do not add historical \
context that was not requested. Charts are rendered by the application; never say you cannot \
produce one.";

const FORMAT_RULES: &str = r#"RESPONSE FORMAT:
- Use **bold** for key figures and facts
- Short paragraphs (2-3 lines)
- Bullet lists for data
- Never show technical payloads (type:, labels:, data:)
- Concise but well formatted"#;

/// Shape requested from the synthesis completion
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SynthesizedAnswer {
    /// Final user-facing answer in Markdown
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidatorConfig {
    pub temperature: f32,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self { temperature: 0.3 }
    }
}

/// Everything the synthesis step reads for one query
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub query: &'a str,
    pub decision: &'a RoutingDecision,
    pub report: &'a ExecutionReport,
    /// Formatted retrieval context, used when no agent block exists
    pub context: &'a str,
    pub history: &'a [ChatTurn],
}

pub struct Consolidator {
    completion: Arc<dyn CompletionService>,
    knowledge: Arc<DomainKnowledge>,
    history: HistoryWindow,
    config: ConsolidatorConfig,
}

impl Consolidator {
    pub fn new(completion: Arc<dyn CompletionService>, knowledge: Arc<DomainKnowledge>) -> Self {
        Self {
            completion,
            knowledge,
            history: HistoryWindow::default(),
            config: ConsolidatorConfig::default(),
        }
    }

    pub fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.history = window;
        self
    }

    pub fn with_config(mut self, config: ConsolidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn consolidate(&self, input: &SynthesisInput<'_>) -> Result<String> {
        let blocks = input.report.rendered_blocks();
        let prompt = if blocks.is_empty() {
            debug!("No agent output to merge, synthesizing from retrieved context");
            self.direct_prompt(input)
        } else {
            let combined = blocks
                .iter()
                .map(|(agent, block)| format!("[{}]\n{}", agent.label(), block))
                .collect::<Vec<_>>()
                .join(BLOCK_SEPARATOR);
            self.merge_prompt(input, &combined)
        };

        let synthesized: SynthesizedAnswer = complete_as(
            self.completion.as_ref(),
            SYSTEM_PROMPT,
            prompt,
            self.config.temperature,
        )
        .await
        .map_err(ForensicError::ConsolidationFailure)?;

        let answer = synthesized.answer.trim();
        if answer.is_empty() {
            return Err(ForensicError::ConsolidationFailure(
                ServiceError::SchemaMismatch("Synthesis returned an empty answer".to_string()),
            ));
        }

        info!(
            merged_blocks = blocks.len(),
            answer_chars = answer.chars().count(),
            "Answer synthesized"
        );
        Ok(answer.to_string())
    }

    fn merge_prompt(&self, input: &SynthesisInput<'_>, combined: &str) -> String {
        let rule = "=".repeat(70);
        let mut prompt = String::new();
        if let Some(history) = self.history.render(input.history) {
            prompt.push_str(&history);
            prompt.push_str(
                "Use the conversation above to resolve references to earlier questions.\n\n",
            );
        }
        prompt.push_str(&format!("The user asked: \"{}\"\n\n", input.query));
        prompt.push_str(&self.knowledge_section(&rule));
        prompt.push_str(&format!(
            "{rule}\nAGENT ANALYSES:\n{rule}\n{}\n\n",
            combined,
            rule = rule
        ));
        prompt.push_str(
            "Rules:\n1. Prefer the official figures above over any other number.\n\
             2. Never claim the data is unavailable when it appears above.\n\n",
        );
        prompt.push_str(&self.closing(input));
        prompt
    }

    fn direct_prompt(&self, input: &SynthesisInput<'_>) -> String {
        let rule = "=".repeat(70);
        let mut prompt = String::new();
        if let Some(history) = self.history.render(input.history) {
            prompt.push_str(&history);
            prompt.push('\n');
        }
        prompt.push_str(&self.knowledge_section(&rule));
        prompt.push_str(&format!(
            "{rule}\nSUPPORTING DOCUMENTS:\n{rule}\n{}\n\n",
            input.context,
            rule = rule
        ));
        prompt.push_str(&format!("QUESTION: {}\n\n", input.query));
        prompt.push_str(&self.closing(input));
        prompt
    }

    fn knowledge_section(&self, rule: &str) -> String {
        if self.knowledge.fixed_context.trim().is_empty() {
            return String::new();
        }
        format!(
            "{rule}\nOFFICIAL PORTFOLIO DATA (primary source of figures):\n{rule}\n{}\n\n",
            self.knowledge.fixed_context,
            rule = rule
        )
    }

    /// Tone, language, chart note and format rules
    fn closing(&self, input: &SynthesisInput<'_>) -> String {
        let mut out = String::new();
        for output in input.report.passthrough() {
            if let AgentOutput::Chart(chart) = output {
                out.push_str(&format!(
                    "A chart titled \"{}\" is displayed next to this answer. Refer to it, \
                     but do not list its data points.\n",
                    chart.title
                ));
            }
        }
        if input.decision.is_emotional {
            out.push_str(
                "The user is distressed. Acknowledge their situation briefly and with empathy \
                 before the facts.\n",
            );
        }
        if input.decision.needs_next_steps {
            out.push_str("Finish with a short list of concrete next steps.\n");
        }
        out.push_str(&format!("Answer in language: {}\n\n", input.decision.language));
        out.push_str(FORMAT_RULES);
        out
    }
}
