//! Arithmetic over figures extracted from the case documents
//!
//! The completion call extracts an expression and its variables; the value is
//! computed locally by [`super::expr::evaluate`].

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::expr::evaluate;
use super::{AgentInput, AgentOutput, Specialist};
use crate::agent::registry::AgentKind;
use crate::errors::ServiceError;
use crate::llm::{complete_as, CompletionService};

const SYSTEM_PROMPT: &str = "You turn a numeric question about the case into one arithmetic \
expression. Use only + - * / and parentheses. Put every figure taken from the documents into \
`variables` with a snake_case name and refer to it by that name in `expression`. \
Do not compute the result yourself.";

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct CalculationRequest {
    /// e.g. "(initial - final_value) / initial * 100"
    pub expression: String,
    #[serde(default)]
    pub variables: BTreeMap<String, f64>,
    /// What is being computed
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub description: String,
    pub expression: String,
    pub variables: BTreeMap<String, f64>,
    pub result: f64,
}

impl CalculationResult {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.description.is_empty() {
            out.push_str(&format!("{}\n\n", self.description));
        }
        out.push_str(&format!("**Expression:** `{}`\n", self.expression));
        for (name, value) in &self.variables {
            out.push_str(&format!("- {} = {}\n", name, value));
        }
        out.push_str(&format!("**Result:** {:.2}\n", self.result));
        out
    }
}

pub struct CalculationAgent {
    completion: Arc<dyn CompletionService>,
}

impl CalculationAgent {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Specialist for CalculationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Calculation
    }

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError> {
        let request: CalculationRequest = complete_as(
            self.completion.as_ref(),
            SYSTEM_PROMPT,
            input.prompt(input.context),
            0.0,
        )
        .await?;

        // an expression the evaluator rejects is a malformed completion
        let result = evaluate(&request.expression, &request.variables).map_err(|e| {
            ServiceError::SchemaMismatch(format!("Expression '{}': {}", request.expression, e))
        })?;

        Ok(AgentOutput::Calculation(CalculationResult {
            description: request.description,
            expression: request.expression,
            variables: request.variables,
            result,
        }))
    }
}
