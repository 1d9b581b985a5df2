//! Resilient Execution Pipeline
//!
//! Runs one agent prompt as a single-turn completion and always produces an
//! [`ExecutionResult`] value. Internally every step returns `Result`; the
//! conversion to `Success`/`Failure` happens once, at the end of
//! [`ExecutionPipeline::run_prompt`].
//!
//! ## Flow
//!
//! ```text
//! compose prompt → timer + progress + audit → credential → completion (timeout)
//!     → audit response → spending-cap check → api-error flag → Success
//!                                  ↓ any error
//!     audit error → progress stop → error.log line → Failure
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use super::audit::{AuditLogger, SharedAuditSession};
use super::context::ExecutionContext;
use super::credential::{Credential, EnvSource};
use super::error_log::{ErrorLogEntry, append_error_log};
use super::provider::{CompletionRequest, SharedProvider};
use super::timeout::with_timeout;
use super::timing::Timer;
use crate::cli::progress::{ProgressOptions, ProgressReporter, error_summary, success_summary};
use crate::config::RunnerConfig;
use crate::constants::{execution, openai};
use crate::types::{
    ClassifiedError, ErrorCategory, ErrorClassifier, ErrorCode, GateError, Result, truncate_chars,
};

// =============================================================================
// Result Types
// =============================================================================

/// Outcome of one agent execution
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success(ExecutionSuccess),
    Failure(ExecutionFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSuccess {
    pub result_text: String,
    pub duration_ms: u64,
    pub turn_count: u32,
    pub cost: f64,
    pub model_name: String,
    pub partial_cost: f64,
    /// Body mentions an API error although the call succeeded
    pub api_error_detected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionFailure {
    pub error_message: String,
    pub error_type_name: String,
    pub truncated_prompt_preview: String,
    pub duration_ms: u64,
    pub cost: f64,
    pub retryable: bool,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failures report their classification; successes are never retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Success(_) => false,
            Self::Failure(f) => f.retryable,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::Success(s) => s.duration_ms,
            Self::Failure(f) => f.duration_ms,
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            Self::Success(s) => s.cost,
            Self::Failure(f) => f.cost,
        }
    }

    pub fn as_success(&self) -> Option<&ExecutionSuccess> {
        match self {
            Self::Success(s) => Some(s),
            Self::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f),
        }
    }

    pub fn into_result(self) -> std::result::Result<ExecutionSuccess, ExecutionFailure> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Failure(f) => Err(f),
        }
    }
}

impl From<std::result::Result<ExecutionSuccess, ExecutionFailure>> for ExecutionResult {
    fn from(result: std::result::Result<ExecutionSuccess, ExecutionFailure>) -> Self {
        match result {
            Ok(s) => Self::Success(s),
            Err(f) => Self::Failure(f),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Per-call settings resolved from configuration
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub model: String,
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
    pub progress: ProgressOptions,
}

impl ExecutionOptions {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            model: config.openai.model.clone(),
            max_output_tokens: config.openai.max_output_tokens,
            request_timeout: config.openai.request_timeout(),
            progress: ProgressOptions {
                disable_loader: config.output.disable_loader,
                heartbeat_interval: Duration::from_secs(config.output.heartbeat_interval_secs),
            },
        }
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// Successful call, before the result value is assembled
struct CallOutcome {
    text: String,
    model: String,
    cost: f64,
}

/// Single-turn agent executor
pub struct ExecutionPipeline {
    provider: SharedProvider,
    env: Arc<dyn EnvSource>,
    options: ExecutionOptions,
}

impl ExecutionPipeline {
    pub fn new(provider: SharedProvider, env: Arc<dyn EnvSource>, options: ExecutionOptions) -> Self {
        Self {
            provider,
            env,
            options,
        }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Run one prompt and report the outcome as a value.
    ///
    /// Never returns an error: credential, transport, timeout and
    /// spending-cap problems all become `ExecutionResult::Failure`.
    pub async fn run_prompt(
        &self,
        prompt: &str,
        source_dir: &Path,
        context: &str,
        description: &str,
        audit_session: Option<SharedAuditSession>,
    ) -> ExecutionResult {
        let full_prompt = compose_prompt(context, prompt);
        let exec_ctx = ExecutionContext::detect(description);

        let mut timer = Timer::start(&exec_ctx.agent_key);
        let mut progress =
            ProgressReporter::new(description, exec_ctx.output_mode, self.options.progress);
        progress.start();
        let audit = AuditLogger::new(audit_session, &exec_ctx.agent_key);

        debug!(
            agent = %exec_ctx.agent_key,
            parallel = exec_ctx.is_parallel,
            prompt_chars = full_prompt.chars().count(),
            "Executing agent prompt"
        );

        let mut turn_count = 0;
        let outcome = self.execute(&full_prompt, &audit, &mut turn_count).await;
        let duration_ms = timer.stop().as_millis() as u64;

        match outcome {
            Ok(call) => {
                progress.finish(&success_summary(turn_count, duration_ms));
                let api_error_detected = ErrorClassifier::detect_api_error(&call.text);
                if api_error_detected {
                    info!(agent = %exec_ctx.agent_key, "Response mentions an API error");
                }

                ExecutionResult::Success(ExecutionSuccess {
                    result_text: call.text,
                    duration_ms,
                    turn_count,
                    cost: call.cost,
                    model_name: call.model,
                    partial_cost: call.cost,
                    api_error_detected,
                })
            }
            Err(err) => {
                audit.log_error(&err, duration_ms, turn_count).await;
                progress.stop(&error_summary(&err.to_string(), duration_ms));

                let classified = ErrorClassifier::classify(&err);
                append_error_log(
                    source_dir,
                    &ErrorLogEntry::new(
                        &exec_ctx.agent_key,
                        &err,
                        source_dir,
                        &full_prompt,
                        classified.retryable,
                        duration_ms,
                    ),
                )
                .await;

                ExecutionResult::Failure(ExecutionFailure {
                    error_message: classified.message,
                    error_type_name: err.name().to_string(),
                    truncated_prompt_preview: truncate_chars(
                        &full_prompt,
                        execution::PROMPT_PREVIEW_CHARS,
                    ),
                    duration_ms,
                    cost: openai::COST_PER_CALL_USD,
                    retryable: classified.retryable,
                    category: classified.category,
                    code: classified.code,
                })
            }
        }
    }

    async fn execute(
        &self,
        prompt: &str,
        audit: &AuditLogger,
        turn_count: &mut u32,
    ) -> Result<CallOutcome> {
        let credential = Credential::from_env(self.env.as_ref()).ok_or_else(|| {
            ClassifiedError::config(
                ErrorCode::AuthFailed,
                "No API credentials found. Set OPENAI_API_KEY",
            )
        })?;

        let request = CompletionRequest {
            model: self.options.model.clone(),
            prompt: prompt.to_string(),
            max_completion_tokens: self.options.max_output_tokens,
        };
        let completion = with_timeout(
            self.options.request_timeout,
            self.provider.complete(&credential, &request),
            "completion request",
        )
        .await?;

        *turn_count = execution::TURNS_PER_CALL;
        let cost = openai::COST_PER_CALL_USD;
        audit.log_llm_response(*turn_count, &completion.text).await;

        if ErrorClassifier::is_spending_cap_behavior(*turn_count, cost, &completion.text) {
            return Err(GateError::from(
                ClassifiedError::billing(format!(
                    "Spending cap likely reached: {}",
                    truncate_chars(&completion.text, execution::ERROR_SUMMARY_CHARS)
                ))
                .with_context("turn_count", *turn_count)
                .with_context("cost", cost),
            ));
        }

        Ok(CallOutcome {
            text: completion.text,
            model: completion.model,
            cost,
        })
    }
}

/// Context first, then the prompt; empty context is omitted
fn compose_prompt(context: &str, prompt: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("{}\n\n{}", context, prompt)
    }
}
