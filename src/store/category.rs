//! Evidence category taxonomy and its priority tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{ForensicError, Result};

/// Fixed partition of the evidentiary corpus; one collection per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Hand-curated narrative analysis of the whole case
    CompleteAnalysis,
    /// Financial facts extracted from statements and fee schedules
    PortfolioFacts,
    /// Forensic findings: violations, evidence, conclusions
    ForensicAnalysis,
    /// Global and institutional historical events
    HistoricalContext,
    /// Client-specific event timeline
    ClientTimeline,
    /// Official policy and regulatory documents
    OfficialDocs,
}

impl Category {
    /// All categories in declaration order
    pub const ALL: [Category; 6] = [
        Category::CompleteAnalysis,
        Category::PortfolioFacts,
        Category::ForensicAnalysis,
        Category::HistoricalContext,
        Category::ClientTimeline,
        Category::OfficialDocs,
    ];

    /// Collection name backing this category
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompleteAnalysis => "complete_analysis",
            Self::PortfolioFacts => "portfolio_facts",
            Self::ForensicAnalysis => "forensic_analysis",
            Self::HistoricalContext => "historical_context",
            Self::ClientTimeline => "client_timeline",
            Self::OfficialDocs => "official_docs",
        }
    }

    /// Upper-case label used when rendering context blocks
    pub fn label(&self) -> String {
        self.as_str().to_uppercase().replace('_', " ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ForensicError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ForensicError::InvalidInput(format!("Unknown category: {}", s)))
    }
}

/// Priority tier governing search order and result budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Primary,
    Secondary,
    Tertiary,
}

/// Immutable, ordered category configuration handed to the retriever
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRegistry {
    primary: Category,
    secondary: Vec<Category>,
    tertiary: Vec<Category>,
}

impl CategoryRegistry {
    /// Build a registry; a category may appear in at most one slot
    pub fn new(
        primary: Category,
        secondary: Vec<Category>,
        tertiary: Vec<Category>,
    ) -> Result<Self> {
        let mut seen = vec![primary];
        for category in secondary.iter().chain(tertiary.iter()) {
            if seen.contains(category) {
                return Err(ForensicError::ConfigError(format!(
                    "Category {} listed more than once in registry",
                    category
                )));
            }
            seen.push(*category);
        }

        Ok(Self {
            primary,
            secondary,
            tertiary,
        })
    }

    /// The forensic case taxonomy
    pub fn forensic() -> Self {
        Self {
            primary: Category::CompleteAnalysis,
            secondary: vec![Category::PortfolioFacts, Category::ForensicAnalysis],
            tertiary: vec![
                Category::HistoricalContext,
                Category::ClientTimeline,
                Category::OfficialDocs,
            ],
        }
    }

    pub fn primary(&self) -> Category {
        self.primary
    }

    pub fn secondary(&self) -> &[Category] {
        &self.secondary
    }

    pub fn tertiary(&self) -> &[Category] {
        &self.tertiary
    }

    /// Tier of a category, if it is registered
    pub fn tier_of(&self, category: Category) -> Option<Tier> {
        if category == self.primary {
            Some(Tier::Primary)
        } else if self.secondary.contains(&category) {
            Some(Tier::Secondary)
        } else if self.tertiary.contains(&category) {
            Some(Tier::Tertiary)
        } else {
            None
        }
    }

    /// Every registered category in cascade order
    pub fn all(&self) -> Vec<Category> {
        let mut all = Vec::with_capacity(1 + self.secondary.len() + self.tertiary.len());
        all.push(self.primary);
        all.extend_from_slice(&self.secondary);
        all.extend_from_slice(&self.tertiary);
        all
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::forensic()
    }
}
