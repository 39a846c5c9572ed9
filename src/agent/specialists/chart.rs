//! Chart specification from the fixed numeric series
//!
//! The completion call only picks a series id from the catalog. Labels and
//! values are copied from the domain knowledge, never from model output.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{AgentInput, AgentOutput, Specialist};
use crate::agent::knowledge::{ChartSeries, ChartType, DomainKnowledge};
use crate::agent::registry::AgentKind;
use crate::errors::ServiceError;
use crate::llm::{complete_as, CompletionService};

const SYSTEM_PROMPT: &str = "You choose which chart answers the user's request. \
Reply with the id of exactly one series from the catalog. Never invent an id.";

/// Shape requested from the selection completion
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SeriesChoice {
    /// Id of one catalog series
    pub series_id: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpecification {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    pub data: ChartData,
    pub x_label: String,
    pub y_label: String,
    pub insights: Vec<String>,
    pub series_id: String,
}

impl From<&ChartSeries> for ChartSpecification {
    fn from(series: &ChartSeries) -> Self {
        Self {
            chart_type: series.chart_type,
            title: series.title.clone(),
            data: ChartData {
                labels: series.labels.clone(),
                datasets: vec![Dataset {
                    label: series.y_label.clone(),
                    data: series.values.clone(),
                }],
            },
            x_label: series.x_label.clone(),
            y_label: series.y_label.clone(),
            insights: series.insights.clone(),
            series_id: series.id.clone(),
        }
    }
}

pub struct ChartAgent {
    completion: Arc<dyn CompletionService>,
    knowledge: Arc<DomainKnowledge>,
}

impl ChartAgent {
    pub fn new(completion: Arc<dyn CompletionService>, knowledge: Arc<DomainKnowledge>) -> Self {
        Self {
            completion,
            knowledge,
        }
    }
}

#[async_trait]
impl Specialist for ChartAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Chart
    }

    async fn run(&self, input: &AgentInput<'_>) -> Result<AgentOutput, ServiceError> {
        if self.knowledge.chart_series.is_empty() {
            return Err(ServiceError::MissingData(
                "No chart series in domain knowledge".to_string(),
            ));
        }

        let user = format!(
            "Request: {}\n\nCATALOG:\n{}",
            input.query,
            self.knowledge.series_catalog()
        );
        let choice: SeriesChoice =
            complete_as(self.completion.as_ref(), SYSTEM_PROMPT, user, 0.0).await?;
        debug!(series = %choice.series_id, reasoning = %choice.reasoning, "Chart series selected");

        let series = self.knowledge.series(&choice.series_id).ok_or_else(|| {
            ServiceError::SchemaMismatch(format!("Unknown chart series: {}", choice.series_id))
        })?;
        Ok(AgentOutput::Chart(ChartSpecification::from(series)))
    }
}
