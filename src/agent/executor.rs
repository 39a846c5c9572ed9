//! Specialist fan-out
//!
//! Every routed specialist runs against the same read-only input. Runs are
//! polled concurrently on the caller's task (bounded by a semaphore, one at a
//! time when routing asked for sequential execution), each under its own
//! timeout. A failing or timed-out agent is logged and reported; it never
//! affects the others. Nothing is spawned, so dropping the returned future
//! cancels every in-flight call.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::registry::AgentKind;
use super::specialists::{AgentInput, AgentOutput, SpecialistSet};
use crate::errors::{ForensicError, ServiceError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-agent deadline
    pub agent_timeout_ms: u64,
    /// Upper bound on concurrently running agents
    pub max_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 60_000,
            max_concurrency: 4,
        }
    }
}

/// One excluded agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailureReport {
    pub agent: AgentKind,
    /// `ServiceError::kind()` of the cause
    pub kind: String,
    pub message: String,
}

/// Outcome of one fan-out, in routing order
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub outputs: Vec<AgentOutput>,
    pub failures: Vec<AgentFailureReport>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> Vec<AgentKind> {
        self.outputs.iter().map(AgentOutput::kind).collect()
    }

    pub fn failed(&self) -> Vec<AgentKind> {
        self.failures.iter().map(|f| f.agent).collect()
    }

    /// `(agent, block)` for every output that renders into the synthesis prompt
    pub fn rendered_blocks(&self) -> Vec<(AgentKind, String)> {
        self.outputs
            .iter()
            .filter_map(|o| o.render().map(|block| (o.kind(), block)))
            .collect()
    }

    /// Outputs handed to the caller unchanged
    pub fn passthrough(&self) -> impl Iterator<Item = &AgentOutput> {
        self.outputs.iter().filter(|o| o.is_passthrough())
    }
}

pub struct AgentExecutor {
    specialists: SpecialistSet,
    config: ExecutorConfig,
}

impl AgentExecutor {
    pub fn new(specialists: SpecialistSet) -> Self {
        Self {
            specialists,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every routed specialist; never fails as a whole
    pub async fn execute(&self, input: &AgentInput<'_>) -> ExecutionReport {
        let selected = input.decision.specialists();
        if selected.is_empty() {
            debug!("No specialists routed");
            return ExecutionReport::default();
        }

        let limit = if input.decision.parallel {
            self.config.max_concurrency.max(1)
        } else {
            1
        };
        let semaphore = Semaphore::new(limit);
        let deadline = Duration::from_millis(self.config.agent_timeout_ms);

        let runs = selected.iter().map(|&kind| {
            let semaphore = &semaphore;
            async move {
                let Some(specialist) = self.specialists.get(kind) else {
                    return (
                        kind,
                        Err(ServiceError::MissingData(format!(
                            "No specialist registered for '{}'",
                            kind
                        ))),
                    );
                };

                let _permit = semaphore.acquire().await.ok();
                let started = Instant::now();
                let outcome = match tokio::time::timeout(deadline, specialist.run(input)).await {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::Timeout {
                        duration_ms: self.config.agent_timeout_ms,
                    }),
                };
                debug!(
                    agent = %kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "Agent finished"
                );
                (kind, outcome)
            }
        });

        let mut report = ExecutionReport::default();
        for (kind, outcome) in join_all(runs).await {
            match outcome {
                Ok(output) => report.outputs.push(output),
                Err(source) => {
                    let kind_name = source.kind().to_string();
                    let message = source.to_string();
                    let err = ForensicError::AgentFailure {
                        agent: kind.to_string(),
                        source,
                    };
                    warn!(agent = %kind, kind = %kind_name, error = %err, "Agent excluded from consolidation");
                    report.failures.push(AgentFailureReport {
                        agent: kind,
                        kind: kind_name,
                        message,
                    });
                }
            }
        }

        info!(
            succeeded = ?report.succeeded(),
            failed = ?report.failed(),
            "Fan-out settled"
        );
        report
    }
}
