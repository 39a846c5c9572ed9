//! Fixed domain knowledge loaded once at startup
//!
//! Holds the authoritative case summary injected into every synthesis prompt
//! and the numeric series the chart agent is allowed to draw. The value is
//! immutable after loading and shared by `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::errors::{ForensicError, Result};

/// Chart rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Bar,
    Pie,
}

/// One drawable numeric series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub chart_type: ChartType,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default)]
    pub insights: Vec<String>,
    /// What the series shows; offered to the selection prompt
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainKnowledge {
    /// Official figures appended to every synthesis prompt
    #[serde(default)]
    pub fixed_context: String,
    #[serde(default)]
    pub chart_series: Vec<ChartSeries>,
}

impl DomainKnowledge {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read and validate a knowledge file (JSON)
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let knowledge: DomainKnowledge = serde_json::from_str(&raw)?;
        knowledge.validate()?;
        info!(
            path = %path.display(),
            series = knowledge.chart_series.len(),
            fixed_context_chars = knowledge.fixed_context.chars().count(),
            "Loaded domain knowledge"
        );
        Ok(knowledge)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for series in &self.chart_series {
            if series.id.trim().is_empty() {
                return Err(ForensicError::ConfigError(
                    "Chart series with empty id".to_string(),
                ));
            }
            if !seen.insert(series.id.as_str()) {
                return Err(ForensicError::ConfigError(format!(
                    "Duplicate chart series id: {}",
                    series.id
                )));
            }
            if series.labels.len() != series.values.len() {
                return Err(ForensicError::ConfigError(format!(
                    "Chart series '{}' has {} labels but {} values",
                    series.id,
                    series.labels.len(),
                    series.values.len()
                )));
            }
        }
        Ok(())
    }

    pub fn series(&self, id: &str) -> Option<&ChartSeries> {
        let id = id.trim();
        self.chart_series.iter().find(|s| s.id == id)
    }

    /// "- id: title (description)" lines for the chart selection prompt
    pub fn series_catalog(&self) -> String {
        self.chart_series
            .iter()
            .map(|s| {
                if s.description.is_empty() {
                    format!("- {}: {}", s.id, s.title)
                } else {
                    format!("- {}: {} ({})", s.id, s.title, s.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
