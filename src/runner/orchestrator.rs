//! Run Orchestrator
//!
//! ```text
//! preflight ──fail──▶ RunReport { preflight_error }
//!     │ ok
//!     ▼
//! steps ──▶ pipeline (retry while failure.retryable) ──▶ validator ──▶ StepReport
//! ```
//!
//! Retry timing comes from the pentest config's `retry_preset`:
//! - `default`: short exponential backoff for transient network errors
//! - `subscription`: waits of minutes, long enough for spending caps to reset
//!
//! Billing failures never wait less than `billing_min_delay`, whatever the preset.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use futures::StreamExt;
use tracing::{info, warn};

use super::validator::ValidatorRegistry;
use super::{AgentStep, RunReport, StepReport};
use crate::ai::{
    AuditSession, ExecutionContext, ExecutionFailure, ExecutionPipeline, PreflightGate,
    SharedAuditSession, Timer,
};
use crate::config::{RetryPreset, parse_config};
use crate::constants::{pentest_config, retry};
use crate::types::{
    ClassifiedError, ErrorCategory, SessionId, format_duration_ms, log_filter_warn,
};

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Floor for waits after a billing failure
    pub billing_min_delay: Duration,
}

impl RetryPolicy {
    pub fn from_preset(preset: RetryPreset) -> Self {
        match preset {
            RetryPreset::Standard => Self {
                max_retries: retry::default::MAX_RETRIES,
                min_delay: Duration::from_secs(retry::default::MIN_DELAY_SECS),
                max_delay: Duration::from_secs(retry::default::MAX_DELAY_SECS),
                jitter: true,
                billing_min_delay: ErrorCategory::Billing.recommended_delay(),
            },
            RetryPreset::Subscription => Self {
                max_retries: retry::subscription::MAX_RETRIES,
                min_delay: Duration::from_secs(retry::subscription::MIN_DELAY_SECS),
                max_delay: Duration::from_secs(retry::subscription::MAX_DELAY_SECS),
                jitter: true,
                billing_min_delay: ErrorCategory::Billing.recommended_delay(),
            },
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }

    /// Wait before the next attempt; `None` once retries are exhausted
    fn delay_for(&self, category: ErrorCategory, backoff: Option<Duration>) -> Option<Duration> {
        backoff.map(|delay| match category {
            ErrorCategory::Billing => delay.max(self.billing_min_delay),
            _ => delay,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_preset(RetryPreset::default())
    }
}

/// Settings resolved once the gate has passed
#[derive(Debug, Clone, Copy)]
struct RunSettings {
    retry: RetryPolicy,
    max_concurrent: usize,
}

/// Gate plus retrying step runner
pub struct Orchestrator {
    gate: PreflightGate,
    pipeline: Arc<ExecutionPipeline>,
    validators: ValidatorRegistry,
    audit_session: Option<SharedAuditSession>,
    retry_override: Option<RetryPolicy>,
}

impl Orchestrator {
    pub fn new(gate: PreflightGate, pipeline: Arc<ExecutionPipeline>) -> Self {
        Self {
            gate,
            pipeline,
            validators: ValidatorRegistry::new(),
            audit_session: None,
            retry_override: None,
        }
    }

    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_audit_session(mut self, session: SharedAuditSession) -> Self {
        self.audit_session = Some(session);
        self
    }

    /// Use `policy` instead of the config file's retry preset
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_override = Some(policy);
        self
    }

    /// Run steps one after another, halting at the first failed step
    pub async fn run(
        &self,
        repo_path: &Path,
        config_path: Option<&Path>,
        steps: &[AgentStep],
    ) -> RunReport {
        let mut timer = Timer::start("run");
        let settings = match self.prepare(repo_path, config_path).await {
            Ok(settings) => settings,
            Err(err) => return self.refused(err, &mut timer),
        };

        let mut reports = Vec::with_capacity(steps.len());
        for step in steps {
            let report = self.run_step(repo_path, step, settings.retry).await;
            let passed = report.passed();
            reports.push(report);
            if !passed {
                warn!("Halting run: '{}' failed", step.description);
                break;
            }
        }

        self.finish(reports, &mut timer)
    }

    /// Run independent steps concurrently, bounded by `max_concurrent_pipelines`.
    /// Reports are returned in completion order.
    pub async fn run_parallel(
        &self,
        repo_path: &Path,
        config_path: Option<&Path>,
        steps: &[AgentStep],
    ) -> RunReport {
        let mut timer = Timer::start("run");
        let settings = match self.prepare(repo_path, config_path).await {
            Ok(settings) => settings,
            Err(err) => return self.refused(err, &mut timer),
        };

        info!(
            "Running {} agents with concurrency {}",
            steps.len(),
            settings.max_concurrent
        );
        let reports = futures::stream::iter(steps)
            .map(|step| self.run_step(repo_path, step, settings.retry))
            .buffer_unordered(settings.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        self.finish(reports, &mut timer)
    }

    async fn prepare(
        &self,
        repo_path: &Path,
        config_path: Option<&Path>,
    ) -> Result<RunSettings, ClassifiedError> {
        self.gate
            .run_preflight_checks(repo_path, config_path)
            .await?;

        let pentest = match config_path {
            Some(path) => log_filter_warn(parse_config(path).await, "Failed to re-read config"),
            None => None,
        };
        let preset = pentest
            .as_ref()
            .map(|c| c.retry_preset())
            .unwrap_or_default();
        let max_concurrent = pentest
            .as_ref()
            .map(|c| c.max_concurrent_pipelines())
            .unwrap_or(pentest_config::DEFAULT_CONCURRENT_PIPELINES);

        Ok(RunSettings {
            retry: self
                .retry_override
                .unwrap_or_else(|| RetryPolicy::from_preset(preset)),
            max_concurrent,
        })
    }

    async fn run_step(&self, repo_path: &Path, step: &AgentStep, policy: RetryPolicy) -> StepReport {
        let agent_key = ExecutionContext::detect(&step.description).agent_key;
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let pipeline = self.pipeline.as_ref();
        let audit = &self.audit_session;

        let outcome = (move || async move {
            counter.fetch_add(1, Ordering::Relaxed);
            pipeline
                .run_prompt(
                    &step.prompt,
                    repo_path,
                    &step.context,
                    &step.description,
                    audit.clone(),
                )
                .await
                .into_result()
        })
        .retry(policy.backoff())
        .when(|failure: &ExecutionFailure| failure.retryable)
        .adjust(|failure: &ExecutionFailure, backoff: Option<Duration>| {
            policy.delay_for(failure.category, backoff)
        })
        .notify(|failure: &ExecutionFailure, delay: Duration| {
            warn!(
                "[{}] {} failure, retrying in {}: {}",
                agent_key,
                failure.category,
                format_duration_ms(delay.as_millis() as u64),
                failure.error_message
            );
        })
        .await;

        let validation_error = match &outcome {
            Ok(success) => self
                .validators
                .validate(&agent_key, repo_path, success)
                .inspect_err(|reason| warn!("[{}] output rejected: {}", agent_key, reason))
                .err(),
            Err(_) => None,
        };

        StepReport {
            description: step.description.clone(),
            agent_key,
            attempts: attempts.load(Ordering::Relaxed),
            result: outcome.into(),
            validation_error,
        }
    }

    fn refused(&self, err: ClassifiedError, timer: &mut Timer) -> RunReport {
        RunReport {
            session_id: self.session_id(),
            preflight_error: Some(err),
            steps: Vec::new(),
            duration_ms: timer.stop().as_millis() as u64,
        }
    }

    fn finish(&self, steps: Vec<StepReport>, timer: &mut Timer) -> RunReport {
        let report = RunReport {
            session_id: self.session_id(),
            preflight_error: None,
            steps,
            duration_ms: timer.stop().as_millis() as u64,
        };
        info!(
            "Run finished: {}/{} steps passed in {}",
            report.steps.iter().filter(|s| s.passed()).count(),
            report.steps.len(),
            format_duration_ms(report.duration_ms)
        );
        report
    }

    fn session_id(&self) -> Option<SessionId> {
        self.audit_session.as_ref().map(|s| s.id().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{EnvSource, ExecutionOptions, MemoryAuditSession, OpenAiProvider};
    use crate::cli::progress::ProgressOptions;
    use crate::runner::NonEmptyResponse;
    use crate::types::ErrorCode;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn quick_retries(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
            billing_min_delay: Duration::from_millis(5),
        }
    }

    fn orchestrator(server: &MockServer, key: Option<&str>) -> Orchestrator {
        let env: Arc<dyn EnvSource> = Arc::new(
            key.map(|k| HashMap::from([("OPENAI_API_KEY".to_string(), k.to_string())]))
                .unwrap_or_default(),
        );
        let provider = Arc::new(OpenAiProvider::new(&server.base_url()).unwrap());
        let gate = PreflightGate::new(
            provider.clone(),
            env.clone(),
            "gpt-4.1-mini",
            Duration::from_secs(5),
        );
        let options = ExecutionOptions {
            progress: ProgressOptions {
                disable_loader: true,
                heartbeat_interval: Duration::from_secs(30),
            },
            ..ExecutionOptions::default()
        };
        let pipeline = Arc::new(ExecutionPipeline::new(provider, env, options));
        Orchestrator::new(gate, pipeline).with_retry_policy(quick_retries(2))
    }

    fn git_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        dir
    }

    async fn preflight_ok(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"model": "gpt-4.1-mini"}"#);
                then.status(200)
                    .json_body(json!({"choices": [{"message": {"content": "pong"}}]}));
            })
            .await
    }

    async fn agent_reply<'a>(
        server: &'a MockServer,
        status: u16,
        text: &str,
    ) -> httpmock::Mock<'a> {
        let body = json!({"model": "gpt-4.1", "choices": [{"message": {"content": text}}]});
        server
            .mock_async(move |when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(r#"{"model": "gpt-4.1"}"#);
                then.status(status).json_body(body);
            })
            .await
    }

    #[test]
    fn test_presets() {
        let standard = RetryPolicy::from_preset(RetryPreset::Standard);
        assert_eq!(standard.max_retries, 3);
        assert_eq!(standard.min_delay, Duration::from_secs(2));

        let subscription = RetryPolicy::from_preset(RetryPreset::Subscription);
        assert_eq!(subscription.max_retries, 5);
        assert_eq!(subscription.min_delay, Duration::from_secs(300));
        assert_eq!(subscription.max_delay, Duration::from_secs(1800));
        assert!(standard.billing_min_delay >= Duration::from_secs(60));

        assert_eq!(RetryPolicy::default(), standard);
    }

    #[tokio::test]
    async fn test_preflight_failure_runs_no_steps() {
        let server = MockServer::start_async().await;
        let agent = agent_reply(&server, 200, "done").await;
        let repo = git_repo();

        let report = orchestrator(&server, None)
            .run(repo.path(), None, &[AgentStep::new("Recon agent", "go")])
            .await;

        assert!(!report.is_success());
        assert_eq!(
            report.preflight_error.as_ref().and_then(|e| e.code),
            Some(ErrorCode::AuthFailed)
        );
        assert!(report.steps.is_empty());
        agent.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_successful_run() {
        let server = MockServer::start_async().await;
        preflight_ok(&server).await;
        let agent = agent_reply(&server, 200, "findings").await;
        let repo = git_repo();
        let session = Arc::new(MemoryAuditSession::new());

        let report = orchestrator(&server, Some("sk-test"))
            .with_audit_session(session.clone())
            .run(
                repo.path(),
                None,
                &[
                    AgentStep::new("Pre-recon agent", "map the app"),
                    AgentStep::new("Recon agent", "enumerate").with_context("scope: /api"),
                ],
            )
            .await;

        assert!(report.is_success());
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|s| s.attempts == 1));
        assert_eq!(report.session_id.as_ref(), Some(session.id()));
        assert_eq!(report.total_cost(), 0.0);
        agent.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_then_reported() {
        let server = MockServer::start_async().await;
        preflight_ok(&server).await;
        let agent = agent_reply(&server, 503, "unavailable").await;
        let repo = git_repo();

        let report = orchestrator(&server, Some("sk-test"))
            .run(
                repo.path(),
                None,
                &[
                    AgentStep::new("Recon agent", "go"),
                    AgentStep::new("Report agent", "write"),
                ],
            )
            .await;

        assert!(!report.is_success());
        // Second step never runs after the first fails
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].attempts, 3);
        assert!(report.steps[0].result.is_retryable());
        agent.assert_hits_async(3).await;
    }

    #[test]
    fn test_billing_delay_is_raised_to_floor() {
        let policy = RetryPolicy::from_preset(RetryPreset::Standard);
        let backoff = Some(Duration::from_secs(2));

        assert_eq!(
            policy.delay_for(ErrorCategory::Billing, backoff),
            Some(ErrorCategory::Billing.recommended_delay())
        );
        assert_eq!(policy.delay_for(ErrorCategory::Network, backoff), backoff);
        assert_eq!(policy.delay_for(ErrorCategory::Billing, None), None);

        let long = Some(Duration::from_secs(1200));
        assert_eq!(policy.delay_for(ErrorCategory::Billing, long), long);
    }

    #[tokio::test]
    async fn test_billing_failure_waits_for_floor() {
        let server = MockServer::start_async().await;
        preflight_ok(&server).await;
        let agent = agent_reply(&server, 200, "Spending cap reached").await;
        let repo = git_repo();
        let policy = RetryPolicy {
            billing_min_delay: Duration::from_millis(150),
            ..quick_retries(1)
        };

        let started = std::time::Instant::now();
        let report = orchestrator(&server, Some("sk-test"))
            .with_retry_policy(policy)
            .run(repo.path(), None, &[AgentStep::new("Recon agent", "go")])
            .await;

        let step = &report.steps[0];
        assert_eq!(step.attempts, 2);
        assert_eq!(
            step.result.as_failure().map(|f| f.category),
            Some(ErrorCategory::Billing)
        );
        assert!(started.elapsed() >= Duration::from_millis(150));
        agent.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let server = MockServer::start_async().await;
        preflight_ok(&server).await;
        let agent = agent_reply(&server, 400, "bad request").await;
        let repo = git_repo();

        let report = orchestrator(&server, Some("sk-test"))
            .run(repo.path(), None, &[AgentStep::new("Recon agent", "go")])
            .await;

        assert_eq!(report.steps[0].attempts, 1);
        assert_eq!(report.failed_steps().count(), 1);
        agent.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_validator_rejects_output() {
        let server = MockServer::start_async().await;
        preflight_ok(&server).await;
        agent_reply(&server, 200, "   ").await;
        let repo = git_repo();

        let report = orchestrator(&server, Some("sk-test"))
            .with_validators(
                ValidatorRegistry::new().with("recon-agent", Arc::new(NonEmptyResponse)),
            )
            .run(repo.path(), None, &[AgentStep::new("Recon agent", "go")])
            .await;

        let step = &report.steps[0];
        assert!(step.result.is_success());
        assert!(!step.passed());
        assert!(step.validation_error.as_deref().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_parallel_runs_every_step() {
        let server = MockServer::start_async().await;
        preflight_ok(&server).await;
        let agent = agent_reply(&server, 200, "ok").await;
        let repo = git_repo();
        let config = repo.path().join("config.yaml");
        std::fs::write(&config, "pipeline:\n  max_concurrent_pipelines: 2\n").unwrap();

        let steps = vec![
            AgentStep::new("Injection vuln agent", "a"),
            AgentStep::new("XSS vuln agent", "b"),
            AgentStep::new("Auth vuln agent", "c"),
        ];
        let report = orchestrator(&server, Some("sk-test"))
            .run_parallel(repo.path(), Some(&config), &steps)
            .await;

        assert!(report.is_success());
        assert_eq!(report.steps.len(), 3);
        let mut keys: Vec<_> = report.steps.iter().map(|s| s.agent_key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["auth-vuln-agent", "injection-vuln-agent", "xss-vuln-agent"]
        );
        agent.assert_hits_async(3).await;
    }
}
