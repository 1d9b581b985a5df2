//! Configuration Types
//!
//! Runner settings with sensible defaults.
//! Supports global (~/.config/agentgate/) and project (.agentgate/) level configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{execution, openai};
use crate::types::{GateError, Result};

/// Root runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Configuration version
    pub version: String,

    /// Completion endpoint settings
    pub openai: OpenAiSettings,

    /// Progress output settings
    pub output: OutputSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            openai: OpenAiSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl RunnerConfig {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `GateError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.openai.api_base).map_err(|e| {
            GateError::Config(format!(
                "openai.api_base is not a valid URL ({}): {}",
                self.openai.api_base, e
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(GateError::Config(format!(
                "openai.api_base must use http or https, got {}",
                base.scheme()
            )));
        }

        if self.openai.model.trim().is_empty() || self.openai.preflight_model.trim().is_empty() {
            return Err(GateError::Config(
                "openai.model and openai.preflight_model must not be empty".to_string(),
            ));
        }

        if self.openai.max_output_tokens == 0 {
            return Err(GateError::Config(
                "openai.max_output_tokens must be greater than 0".to_string(),
            ));
        }

        if self.openai.request_timeout_secs == 0 || self.openai.preflight_timeout_secs == 0 {
            return Err(GateError::Config(
                "openai timeouts must be greater than 0".to_string(),
            ));
        }

        if self.output.heartbeat_interval_secs == 0 {
            return Err(GateError::Config(
                "output.heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// OpenAI Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// API base URL (chat completions are posted to {api_base}/chat/completions)
    pub api_base: String,

    /// Model for agent execution
    pub model: String,

    /// Model for the preflight credential ping
    pub preflight_model: String,

    /// Output token budget per completion
    pub max_output_tokens: u32,

    /// Upper bound on one completion request
    pub request_timeout_secs: u64,

    /// Upper bound on the preflight ping
    pub preflight_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_base: openai::DEFAULT_API_BASE.to_string(),
            model: openai::DEFAULT_MODEL.to_string(),
            preflight_model: openai::DEFAULT_PREFLIGHT_MODEL.to_string(),
            max_output_tokens: openai::DEFAULT_MAX_OUTPUT_TOKENS,
            request_timeout_secs: openai::DEFAULT_REQUEST_TIMEOUT_SECS,
            preflight_timeout_secs: openai::PREFLIGHT_TIMEOUT_SECS,
        }
    }
}

impl OpenAiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.preflight_timeout_secs)
    }
}

// =============================================================================
// Output Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Replace the visual loader with periodic heartbeat log lines
    pub disable_loader: bool,

    /// Seconds between heartbeat lines
    pub heartbeat_interval_secs: u64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            disable_loader: false,
            heartbeat_interval_secs: execution::HEARTBEAT_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.openai.model, "gpt-4.1");
        assert_eq!(config.openai.preflight_model, "gpt-4.1-mini");
        assert_eq!(config.openai.max_output_tokens, 64_000);
    }

    #[test]
    fn test_rejects_bad_api_base() {
        let mut config = RunnerConfig::default();
        config.openai.api_base = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(GateError::Config(_))));

        config.openai.api_base = "not a url".to_string();
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_budget() {
        let mut config = RunnerConfig::default();
        config.openai.max_output_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_heartbeat() {
        let mut config = RunnerConfig::default();
        config.output.heartbeat_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
