//! Pentest Configuration File
//!
//! Typed schema and validation for the optional YAML file that scopes a run:
//! target rules, authentication flow, and pipeline settings.
//!
//! Read and YAML syntax failures surface as raw errors. Semantic failures come
//! back already classified as `CONFIG_VALIDATION_FAILED`, with the offending
//! field in the error context.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::pentest_config as limits;
use crate::types::{ClassifiedError, ErrorCode, Result};

static TOTP_SECRET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z2-7]+=*$").expect("totp pattern is valid"));

const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PentestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Rules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rules {
    #[serde(default)]
    pub avoid: Vec<Rule>,
    #[serde(default)]
    pub focus: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub description: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub url_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Path,
    Subdomain,
    Domain,
    Method,
    Header,
    Parameter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Authentication {
    pub login_type: LoginType,
    pub login_url: String,
    pub credentials: Credentials,
    #[serde(default)]
    pub login_flow: Vec<String>,
    pub success_condition: SuccessCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    Form,
    Sso,
    Api,
    Basic,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub totp_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("totp_secret", &self.totp_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuccessCondition {
    #[serde(rename = "type")]
    pub condition_type: SuccessConditionType,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessConditionType {
    UrlContains,
    UrlEqualsExactly,
    ElementPresent,
    TextContains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineSettings {
    pub retry_preset: RetryPreset,
    pub max_concurrent_pipelines: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry_preset: RetryPreset::default(),
            max_concurrent_pipelines: limits::DEFAULT_CONCURRENT_PIPELINES,
        }
    }
}

/// Backoff policy applied to retryable step failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPreset {
    /// Seconds-scale backoff for transient network errors
    #[default]
    #[serde(rename = "default")]
    Standard,
    /// Minutes-scale backoff for subscription plans that hit spending caps
    Subscription,
}

impl std::fmt::Display for RetryPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryPreset::Standard => write!(f, "default"),
            RetryPreset::Subscription => write!(f, "subscription"),
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Read, parse, and validate a pentest config file
pub async fn parse_config(path: &Path) -> Result<PentestConfig> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(invalid("path", format!("Config path is not a file: {}", path.display())).into());
    }
    if metadata.len() > limits::MAX_FILE_SIZE {
        return Err(invalid(
            "path",
            format!(
                "Config file too large: {} bytes (max {})",
                metadata.len(),
                limits::MAX_FILE_SIZE
            ),
        )
        .into());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = parse_config_str(&content)?;

    debug!("Parsed pentest config from {}", path.display());
    Ok(config)
}

/// Parse and validate pentest config YAML
pub fn parse_config_str(content: &str) -> Result<PentestConfig> {
    if content.trim().is_empty() {
        return Err(invalid("path", "Config file is empty").into());
    }

    let config: PentestConfig = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

fn invalid(field: &str, message: impl Into<String>) -> ClassifiedError {
    ClassifiedError::config(ErrorCode::ConfigValidationFailed, message).with_context("field", field)
}

impl PentestConfig {
    pub fn retry_preset(&self) -> RetryPreset {
        self.pipeline
            .as_ref()
            .map(|p| p.retry_preset)
            .unwrap_or_default()
    }

    pub fn max_concurrent_pipelines(&self) -> usize {
        self.pipeline
            .as_ref()
            .map(|p| p.max_concurrent_pipelines)
            .unwrap_or(limits::DEFAULT_CONCURRENT_PIPELINES)
    }

    /// Semantic validation beyond what the typed schema enforces
    pub fn validate(&self) -> std::result::Result<(), ClassifiedError> {
        if self.rules.is_none() && self.authentication.is_none() && self.pipeline.is_none() {
            return Err(invalid(
                "root",
                "Configuration must contain at least one of: rules, authentication, pipeline",
            ));
        }

        if let Some(rules) = &self.rules {
            validate_rules(rules)?;
        }
        if let Some(auth) = &self.authentication {
            validate_authentication(auth)?;
        }
        if let Some(pipeline) = &self.pipeline {
            let range = limits::MIN_CONCURRENT_PIPELINES..=limits::MAX_CONCURRENT_PIPELINES;
            if !range.contains(&pipeline.max_concurrent_pipelines) {
                return Err(invalid(
                    "pipeline.max_concurrent_pipelines",
                    format!(
                        "max_concurrent_pipelines must be between {} and {}, got {}",
                        limits::MIN_CONCURRENT_PIPELINES,
                        limits::MAX_CONCURRENT_PIPELINES,
                        pipeline.max_concurrent_pipelines
                    ),
                ));
            }
        }

        Ok(())
    }
}

fn check_dangerous(field: &str, value: &str) -> std::result::Result<(), ClassifiedError> {
    let lower = value.to_lowercase();
    match limits::DANGEROUS_PATTERNS
        .iter()
        .find(|pattern| lower.contains(*pattern))
    {
        Some(pattern) => Err(invalid(
            field,
            format!("{} contains a disallowed pattern: {}", field, pattern),
        )),
        None => Ok(()),
    }
}

fn validate_rules(rules: &Rules) -> std::result::Result<(), ClassifiedError> {
    for (section, entries) in [("avoid", &rules.avoid), ("focus", &rules.focus)] {
        for (idx, rule) in entries.iter().enumerate() {
            let field = format!("rules.{}[{}]", section, idx);

            if rule.description.trim().is_empty() {
                return Err(invalid(&field, format!("{}.description must not be empty", field)));
            }
            if rule.url_path.trim().is_empty() {
                return Err(invalid(&field, format!("{}.url_path must not be empty", field)));
            }
            check_dangerous(&field, &rule.description)?;
            check_dangerous(&field, &rule.url_path)?;

            match rule.rule_type {
                RuleType::Path if !rule.url_path.starts_with('/') => {
                    return Err(invalid(
                        &field,
                        format!("{}: path rules must start with '/'", field),
                    ));
                }
                RuleType::Method
                    if !HTTP_METHODS.contains(&rule.url_path.to_uppercase().as_str()) =>
                {
                    return Err(invalid(
                        &field,
                        format!("{}: unknown HTTP method '{}'", field, rule.url_path),
                    ));
                }
                _ => {}
            }
        }
    }

    let avoided: HashSet<(RuleType, &str)> = rules
        .avoid
        .iter()
        .map(|r| (r.rule_type, r.url_path.as_str()))
        .collect();
    if let Some(conflict) = rules
        .focus
        .iter()
        .find(|r| avoided.contains(&(r.rule_type, r.url_path.as_str())))
    {
        return Err(invalid(
            "rules",
            format!(
                "Rule '{}' appears in both avoid and focus",
                conflict.url_path
            ),
        ));
    }

    Ok(())
}

fn validate_authentication(auth: &Authentication) -> std::result::Result<(), ClassifiedError> {
    check_dangerous("authentication.login_url", &auth.login_url)?;
    let url = url::Url::parse(&auth.login_url).map_err(|e| {
        invalid(
            "authentication.login_url",
            format!("login_url is not a valid URL: {}", e),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            "authentication.login_url",
            format!("login_url must use http or https, got {}", url.scheme()),
        ));
    }

    if auth.credentials.username.trim().is_empty() {
        return Err(invalid(
            "authentication.credentials.username",
            "username must not be empty",
        ));
    }
    check_dangerous("authentication.credentials.username", &auth.credentials.username)?;
    if auth.credentials.password.is_empty() {
        return Err(invalid(
            "authentication.credentials.password",
            "password must not be empty",
        ));
    }
    if let Some(secret) = &auth.credentials.totp_secret
        && !TOTP_SECRET.is_match(secret)
    {
        return Err(invalid(
            "authentication.credentials.totp_secret",
            "totp_secret must be base32 encoded",
        ));
    }

    if auth.login_type == LoginType::Form && auth.login_flow.is_empty() {
        return Err(invalid(
            "authentication.login_flow",
            "form login requires at least one login_flow step",
        ));
    }
    for (idx, step) in auth.login_flow.iter().enumerate() {
        check_dangerous(&format!("authentication.login_flow[{}]", idx), step)?;
    }

    if auth.success_condition.value.trim().is_empty() {
        return Err(invalid(
            "authentication.success_condition.value",
            "success_condition.value must not be empty",
        ));
    }
    check_dangerous(
        "authentication.success_condition.value",
        &auth.success_condition.value,
    )?;

    Ok(())
}
