//! Pre-flight Gate
//!
//! Validates the environment before any agent runs, cheapest check first:
//!
//! 1. Repository: path is a directory containing a `.git` directory
//! 2. Config: the pentest config parses and validates (only when supplied)
//! 3. Credentials: an API key is set and a minimal "ping" completion succeeds
//!
//! The first failing check ends the gate; later checks never execute.
//! Failures are returned as classified values, never raised.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::credential::{Credential, EnvSource};
use super::provider::{CompletionRequest, SharedProvider};
use super::timeout::with_timeout;
use crate::config::{RunnerConfig, parse_config};
use crate::constants::openai;
use crate::types::{ClassifiedError, ErrorClassifier, ErrorCode, GateError};

/// Gate outcome: success carries nothing, failure carries one classified error
pub type PreflightOutcome = std::result::Result<(), ClassifiedError>;

/// Sequential pre-flight checker
pub struct PreflightGate {
    provider: SharedProvider,
    env: Arc<dyn EnvSource>,
    preflight_model: String,
    timeout: Duration,
}

impl PreflightGate {
    pub fn new(
        provider: SharedProvider,
        env: Arc<dyn EnvSource>,
        preflight_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            env,
            preflight_model: preflight_model.into(),
            timeout,
        }
    }

    pub fn from_config(
        provider: SharedProvider,
        env: Arc<dyn EnvSource>,
        config: &RunnerConfig,
    ) -> Self {
        Self::new(
            provider,
            env,
            config.openai.preflight_model.clone(),
            config.openai.preflight_timeout(),
        )
    }

    /// Run all checks in order, stopping at the first failure
    pub async fn run_preflight_checks(
        &self,
        repo_path: &Path,
        config_path: Option<&Path>,
    ) -> PreflightOutcome {
        info!("Running pre-flight checks...");

        info!("Checking repository: {}", repo_path.display());
        self.check_repository(repo_path).await.inspect_err(log_failure)?;
        info!("Repository OK");

        if let Some(config_path) = config_path {
            info!("Validating config: {}", config_path.display());
            self.check_config(config_path).await.inspect_err(log_failure)?;
            info!("Config OK");
        }

        info!("Checking API credentials...");
        self.check_credentials().await.inspect_err(log_failure)?;
        info!("Credentials OK");

        info!("Pre-flight checks passed");
        Ok(())
    }

    /// Path must be a directory with a `.git` directory inside.
    /// Any filesystem error counts as "not found".
    pub async fn check_repository(&self, repo_path: &Path) -> PreflightOutcome {
        let is_dir = |meta: std::io::Result<std::fs::Metadata>| meta.is_ok_and(|m| m.is_dir());

        if !is_dir(tokio::fs::metadata(repo_path).await) {
            return Err(repo_not_found(
                format!("Repository path not found: {}", repo_path.display()),
                repo_path,
            ));
        }

        if !is_dir(tokio::fs::metadata(repo_path.join(".git")).await) {
            return Err(repo_not_found(
                format!("Not a git repository: {}", repo_path.display()),
                repo_path,
            ));
        }

        Ok(())
    }

    /// Parse and validate the pentest config. Already-classified parser
    /// errors pass through unchanged; anything else is wrapped.
    pub async fn check_config(&self, config_path: &Path) -> PreflightOutcome {
        parse_config(config_path)
            .await
            .map(|_| ())
            .map_err(|err| config_failure(config_path, err))
    }

    /// Key must be set; then one minimal completion must succeed
    pub async fn check_credentials(&self) -> PreflightOutcome {
        let Some(credential) = Credential::from_env(self.env.as_ref()) else {
            return Err(ClassifiedError::config(
                ErrorCode::AuthFailed,
                "No API credentials found. Set OPENAI_API_KEY",
            ));
        };

        let request = CompletionRequest {
            model: self.preflight_model.clone(),
            prompt: openai::PREFLIGHT_PROMPT.to_string(),
            max_completion_tokens: openai::PREFLIGHT_MAX_TOKENS,
        };

        let result = with_timeout(
            self.timeout,
            self.provider.complete(&credential, &request),
            "preflight credential check",
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if ErrorClassifier::is_retryable_error(&err) => Err(ClassifiedError::network(
                format!("API unreachable, check your network connection: {}", err),
            )),
            Err(err) => Err(ClassifiedError::config(
                ErrorCode::AuthFailed,
                format!("API credential check failed: {}", err),
            )),
        }
    }
}

/// Classified parser errors pass through; read and parse errors are wrapped
pub fn config_failure(config_path: &Path, err: GateError) -> ClassifiedError {
    match err {
        GateError::Classified(classified) => classified,
        err => ClassifiedError::config(
            ErrorCode::ConfigValidationFailed,
            format!("Invalid config {}: {}", config_path.display(), err),
        )
        .with_context("config_path", config_path.display().to_string()),
    }
}

fn repo_not_found(message: String, repo_path: &Path) -> ClassifiedError {
    ClassifiedError::config(ErrorCode::RepoNotFound, message)
        .with_context("repo_path", repo_path.display().to_string())
}

fn log_failure(err: &ClassifiedError) {
    warn!("Pre-flight check failed: {}", err);
}
