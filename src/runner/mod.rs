//! Agent Run Orchestration
//!
//! Gates a run with the pre-flight checks, then drives agent steps through
//! the execution pipeline with preset-driven retries and output validation.

mod orchestrator;
pub mod validator;

pub use orchestrator::{Orchestrator, RetryPolicy};
pub use validator::{DeliverableValidator, NonEmptyResponse, OutputValidator, ValidatorRegistry};

use serde::Serialize;

use crate::ai::ExecutionResult;
use crate::types::{ClassifiedError, SessionId};

/// One agent invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStep {
    /// Agent description; also drives the agent key and output mode
    pub description: String,
    pub prompt: String,
    /// Prepended to the prompt when non-empty
    pub context: String,
}

impl AgentStep {
    pub fn new(description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            prompt: prompt.into(),
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub description: String,
    pub agent_key: String,
    /// Pipeline invocations, including the first
    pub attempts: u32,
    pub result: ExecutionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl StepReport {
    pub fn passed(&self) -> bool {
        self.result.is_success() && self.validation_error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Set when the gate refused the run; no steps ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preflight_error: Option<ClassifiedError>,
    pub steps: Vec<StepReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.preflight_error.is_none() && self.steps.iter().all(StepReport::passed)
    }

    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.result.cost()).sum()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.passed())
    }
}
