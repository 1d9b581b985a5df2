//! Unified Error Type System
//!
//! Centralized error types for the gate and the execution pipeline.
//! Provides error classification for retry decisions.
//!
//! ## Error Categories
//!
//! - **Config**: Missing or malformed setup (fail fast, never retry)
//! - **Network**: Connectivity and transient API issues (retry with backoff)
//! - **Billing**: Spending cap exhaustion (retry with extended backoff)

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Repository, config, or credential problem - fail fast
    Config,
    /// Transient connectivity or API condition - retry with backoff
    Network,
    /// Spending cap reached - retry after minutes, not seconds
    Billing,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Network => write!(f, "network"),
            Self::Billing => write!(f, "billing"),
        }
    }
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Billing)
    }

    /// Minimum wait before retrying this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::Billing => Duration::from_secs(300),
            Self::Network => Duration::from_secs(5),
            Self::Config => Duration::ZERO,
        }
    }
}

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RepoNotFound,
    ConfigValidationFailed,
    AuthFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepoNotFound => "REPO_NOT_FOUND",
            Self::ConfigValidationFailed => "CONFIG_VALIDATION_FAILED",
            Self::AuthFailed => "AUTH_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Classified Error
// =============================================================================

/// Error with category, retry hint, optional code, and structured context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedError {
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}:{}] {}", self.category, code, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

impl std::error::Error for ClassifiedError {}

impl ClassifiedError {
    /// Create an error whose retryability follows its category
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            retryable: category.is_retryable(),
            code: None,
            context: BTreeMap::new(),
        }
    }

    /// Non-retryable configuration error with a code
    pub fn config(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, message).with_code(code)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    pub fn billing(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Billing, message)
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum GateError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Remote API Errors
    // -------------------------------------------------------------------------
    /// Non-success HTTP response; body captured verbatim
    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    /// Already-classified error, passed through without re-wrapping
    #[error("{0}")]
    Classified(ClassifiedError),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<ClassifiedError> for GateError {
    fn from(err: ClassifiedError) -> Self {
        GateError::Classified(err)
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

impl GateError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Stable type name used in failure results and error logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
            Self::Yaml(_) => "YamlError",
            Self::Transport(_) => "TransportError",
            Self::Http { .. } => "HttpError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Classified(e) => match e.category {
                ErrorCategory::Config => "ConfigError",
                ErrorCategory::Network => "NetworkError",
                ErrorCategory::Billing => "BillingError",
            },
            Self::Config(_) => "ConfigError",
        }
    }

    /// Machine-readable code, when one exists
    pub fn code(&self) -> Option<String> {
        match self {
            Self::Classified(e) => e.code.map(|c| c.to_string()),
            Self::Io(e) => Some(format!("{:?}", e.kind())),
            _ => None,
        }
    }

    /// HTTP status, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Error followed by its `source()` chain, one cause per line
    pub fn source_chain(&self) -> String {
        let mut chain = self.to_string();
        let mut current = self.source();
        while let Some(cause) = current {
            chain.push_str("\n  caused by: ");
            chain.push_str(&cause.to_string());
            current = cause.source();
        }
        chain
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Substrings that mark a failure as transient
const TRANSIENT_SIGNATURES: &[&str] = &[
    "econnreset",
    "etimedout",
    "econnrefused",
    "enotfound",
    "socket hang up",
    "connection reset",
    "connection refused",
    "network",
    "timeout",
    "timed out",
    "rate limit",
    "too many requests",
    "overloaded",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
    "temporarily unavailable",
];

/// Longest trimmed body still treated as a possible placeholder
const MAX_PLACEHOLDER_CHARS: usize = 200;

/// Degenerate response bodies seen when a provider silently ends a capped session.
/// The whole body must be the notice, allowing a few words around the phrase.
static SPENDING_CAP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\W*(?:[\w']+\W+){0,4}(?:spending (?:cap|limit)|usage limit|credit balance is too low|budget (?:exceeded|exhausted)|quota (?:exceeded|exhausted)|limit (?:has been )?reached|nothing to show)(?:\W+[\w']+){0,4}\W*$",
    )
    .expect("spending cap pattern is valid")
});

/// API error text embedded in an otherwise successful response
static API_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*api error\b|api error:?\s*\d{3}\b")
        .expect("api error pattern is valid")
});

/// Error classifier for retry routing
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Decide whether a raised error is transient.
    ///
    /// Pure function of the error's kind, status, transport flags, and message.
    pub fn is_retryable_error(err: &GateError) -> bool {
        match err {
            GateError::Classified(e) => e.retryable,
            GateError::Config(_) | GateError::Yaml(_) => false,
            GateError::Timeout { .. } => true,
            GateError::Http { status, .. } => Self::is_retryable_status(*status),
            GateError::Transport(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                match e.status() {
                    Some(status) => Self::is_retryable_status(status.as_u16()),
                    None => e.is_request() || Self::has_transient_signature(&e.to_string()),
                }
            }
            GateError::Io(e) => {
                use std::io::ErrorKind;
                matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionRefused
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::BrokenPipe
                        | ErrorKind::TimedOut
                        | ErrorKind::Interrupted
                ) || Self::has_transient_signature(&e.to_string())
            }
            GateError::Json(e) => Self::has_transient_signature(&e.to_string()),
        }
    }

    /// HTTP statuses worth retrying: timeouts, conflicts, rate limits, server errors
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 409 | 429) || (500..=599).contains(&status)
    }

    fn has_transient_signature(message: &str) -> bool {
        let lower = message.to_lowercase();
        TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig))
    }

    /// Detect a capped session that came back shaped like a thin success.
    ///
    /// Provider-level signaling for this condition is unreliable, so the
    /// response shape itself is checked: turns happened, nothing was billed,
    /// and the body is a short known placeholder rather than a report.
    pub fn is_spending_cap_behavior(turn_count: u32, cost: f64, result_text: &str) -> bool {
        let body = result_text.trim();
        turn_count > 0
            && cost == 0.0
            && body.chars().count() <= MAX_PLACEHOLDER_CHARS
            && SPENDING_CAP_PATTERN.is_match(body)
    }

    /// Detect API error text inside a successful response body
    pub fn detect_api_error(result_text: &str) -> bool {
        API_ERROR_PATTERN.is_match(result_text)
    }

    /// Map any raised error onto the category taxonomy
    pub fn classify(err: &GateError) -> ClassifiedError {
        if let GateError::Classified(e) = err {
            return e.clone();
        }

        let retryable = Self::is_retryable_error(err);
        let category = match err {
            GateError::Config(_) | GateError::Yaml(_) => ErrorCategory::Config,
            GateError::Http {
                status: 401 | 403, ..
            } => ErrorCategory::Config,
            _ if retryable => ErrorCategory::Network,
            _ => ErrorCategory::Config,
        };

        let mut classified = ClassifiedError {
            message: err.to_string(),
            category,
            retryable,
            code: None,
            context: BTreeMap::new(),
        };
        if let GateError::Http { status: 401 | 403, .. } = err {
            classified.code = Some(ErrorCode::AuthFailed);
        }
        if let Some(status) = err.status() {
            classified = classified.with_context("status", status);
        }
        classified
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Config.to_string(), "config");
        assert_eq!(ErrorCategory::Network.to_string(), "network");
        assert_eq!(ErrorCategory::Billing.to_string(), "billing");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Billing.is_retryable());
        assert!(!ErrorCategory::Config.is_retryable());
    }

    #[test]
    fn test_billing_delay_is_minutes() {
        assert!(ErrorCategory::Billing.recommended_delay() >= Duration::from_secs(60));
        assert!(
            ErrorCategory::Billing.recommended_delay()
                > ErrorCategory::Network.recommended_delay()
        );
    }

    #[test]
    fn test_classified_error_display() {
        let err = ClassifiedError::config(ErrorCode::RepoNotFound, "Not a git repository");
        assert_eq!(
            err.to_string(),
            "[config:REPO_NOT_FOUND] Not a git repository"
        );
        assert!(!err.retryable);

        let err = ClassifiedError::network("connection reset");
        assert_eq!(err.to_string(), "[network] connection reset");
        assert!(err.retryable);
    }

    #[test]
    fn test_classified_error_serializes_code() {
        let err = ClassifiedError::config(ErrorCode::AuthFailed, "bad key")
            .with_context("model", "gpt-4.1-mini");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "AUTH_FAILED");
        assert_eq!(json["category"], "config");
        assert_eq!(json["context"]["model"], "gpt-4.1-mini");
    }

    #[test]
    fn test_http_status_classification() {
        for status in [408, 429, 500, 502, 503, 504] {
            let err = GateError::Http {
                status,
                body: String::new(),
            };
            assert!(ErrorClassifier::is_retryable_error(&err), "{status}");
        }
        for status in [400, 401, 403, 404, 422] {
            let err = GateError::Http {
                status,
                body: String::new(),
            };
            assert!(!ErrorClassifier::is_retryable_error(&err), "{status}");
        }
    }

    #[test]
    fn test_io_classification() {
        let reset = GateError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "peer reset",
        ));
        assert!(ErrorClassifier::is_retryable_error(&reset));

        let denied = GateError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "no access",
        ));
        assert!(!ErrorClassifier::is_retryable_error(&denied));

        let signature = GateError::Io(std::io::Error::other("read ECONNRESET"));
        assert!(ErrorClassifier::is_retryable_error(&signature));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = GateError::timeout("completion", Duration::from_secs(1));
        assert!(ErrorClassifier::is_retryable_error(&err));
        assert_eq!(err.name(), "TimeoutError");
    }

    #[test]
    fn test_config_is_never_retryable() {
        let err = GateError::Config("rate limit timeout network".to_string());
        assert!(!ErrorClassifier::is_retryable_error(&err));
    }

    #[test]
    fn test_classify_passes_through_classified() {
        let original = ClassifiedError::billing("cap");
        let classified = ErrorClassifier::classify(&GateError::from(original.clone()));
        assert_eq!(classified, original);
    }

    #[test]
    fn test_classify_http_auth_failure() {
        let err = GateError::Http {
            status: 401,
            body: "invalid_api_key".to_string(),
        };
        let classified = ErrorClassifier::classify(&err);
        assert_eq!(classified.category, ErrorCategory::Config);
        assert_eq!(classified.code, Some(ErrorCode::AuthFailed));
        assert!(!classified.retryable);
        assert_eq!(classified.context["status"], 401);
    }

    #[test]
    fn test_classify_rate_limit_as_network() {
        let err = GateError::Http {
            status: 429,
            body: "slow down".to_string(),
        };
        let classified = ErrorClassifier::classify(&err);
        assert_eq!(classified.category, ErrorCategory::Network);
        assert!(classified.retryable);
        assert_eq!(classified.code, None);
    }

    #[test]
    fn test_spending_cap_detection() {
        assert!(ErrorClassifier::is_spending_cap_behavior(
            1,
            0.0,
            "Spending cap reached"
        ));
        assert!(ErrorClassifier::is_spending_cap_behavior(
            3,
            0.0,
            "Your usage limit has been reached"
        ));
        assert!(!ErrorClassifier::is_spending_cap_behavior(
            1,
            0.25,
            "Spending cap reached"
        ));
        assert!(!ErrorClassifier::is_spending_cap_behavior(
            0,
            0.0,
            "Spending cap reached"
        ));
        assert!(!ErrorClassifier::is_spending_cap_behavior(1, 0.0, "pong"));
        assert!(ErrorClassifier::is_spending_cap_behavior(
            1,
            0.0,
            "  Nothing to show.\n"
        ));
    }

    #[test]
    fn test_report_mentioning_limits_is_not_spending_cap() {
        let report = "## Findings\n\
            1. Login endpoint: no lockout; after 500 attempts no rate limit reached.\n\
            2. SQL injection in /search via the `q` parameter.";
        assert!(!ErrorClassifier::is_spending_cap_behavior(1, 0.0, report));

        let sentence = "The upload quota exceeded checks are enforced only client side, \
            so any authenticated user can bypass them with a crafted request.";
        assert!(!ErrorClassifier::is_spending_cap_behavior(1, 0.0, sentence));

        let long = format!("Usage limit reached {}", "x".repeat(MAX_PLACEHOLDER_CHARS));
        assert!(!ErrorClassifier::is_spending_cap_behavior(1, 0.0, &long));
    }

    #[test]
    fn test_detect_api_error() {
        assert!(ErrorClassifier::detect_api_error(
            "API Error: 500 upstream failure"
        ));
        assert!(ErrorClassifier::detect_api_error("api error"));
        assert!(ErrorClassifier::detect_api_error(
            "Request aborted. API Error 529 overloaded"
        ));
        assert!(!ErrorClassifier::detect_api_error("All findings recorded."));
        assert!(!ErrorClassifier::detect_api_error(
            "The login request failed with 403 for the guest role."
        ));
        assert!(!ErrorClassifier::detect_api_error(
            "The /export endpoint returns an internal server error on malformed input."
        ));
    }

    #[test]
    fn test_source_chain_includes_message() {
        let err = GateError::Io(std::io::Error::other("disk full"));
        assert!(err.source_chain().starts_with("IO error: disk full"));
        assert_eq!(err.code().as_deref(), Some("Other"));
    }

    proptest! {
        #[test]
        fn prop_spending_cap_never_fires_when_billed(
            turns in 0u32..100,
            cost in 0.0001f64..1000.0,
            text in ".*",
        ) {
            prop_assert!(!ErrorClassifier::is_spending_cap_behavior(turns, cost, &text));
        }

        #[test]
        fn prop_spending_cap_never_fires_without_turns(text in ".*") {
            prop_assert!(!ErrorClassifier::is_spending_cap_behavior(0, 0.0, &text));
        }

        #[test]
        fn prop_config_errors_never_retryable(message in ".*") {
            prop_assert!(!ErrorClassifier::is_retryable_error(&GateError::Config(message)));
        }
    }
}
