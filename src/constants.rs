//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Environment variable names read by the gate and the pipeline
pub mod env {
    /// API key for the completion endpoint (required)
    pub const API_KEY: &str = "OPENAI_API_KEY";

    /// Model override for both execution and the preflight ping
    pub const MODEL: &str = "OPENAI_MODEL";

    /// Maximum output token budget override
    pub const MAX_OUTPUT_TOKENS: &str = "OPENAI_MAX_OUTPUT_TOKENS";

    /// API base URL override
    pub const BASE_URL: &str = "OPENAI_BASE_URL";

    /// Disables the visual loader in favor of heartbeat lines
    pub const DISABLE_LOADER: &str = "AGENTGATE_DISABLE_LOADER";

    /// Prefix for nested settings (e.g. AGENTGATE_OPENAI__REQUEST_TIMEOUT_SECS)
    pub const SETTINGS_PREFIX: &str = "AGENTGATE_";
}

/// OpenAI endpoint defaults
pub mod openai {
    pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

    /// Model used for agent execution
    pub const DEFAULT_MODEL: &str = "gpt-4.1";

    /// Cheaper model used for the credential ping
    pub const DEFAULT_PREFLIGHT_MODEL: &str = "gpt-4.1-mini";

    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 64_000;

    /// Fixed prompt for the credential ping
    pub const PREFLIGHT_PROMPT: &str = "ping";

    /// Output budget for the credential ping
    pub const PREFLIGHT_MAX_TOKENS: u32 = 16;

    /// Request timeout for a single completion (10 minutes)
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

    /// Request timeout for the credential ping
    pub const PREFLIGHT_TIMEOUT_SECS: u64 = 30;

    /// TCP connect timeout
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Cost recorded per call. The completion response carries no billing figure.
    pub const COST_PER_CALL_USD: f64 = 0.0;
}

/// Execution pipeline constants
pub mod execution {
    /// Interval between heartbeat lines when the loader is disabled
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

    /// Characters of the prompt kept in error logs
    pub const PROMPT_PREVIEW_CHARS: usize = 200;

    /// Characters of an error message shown in progress summaries
    pub const ERROR_SUMMARY_CHARS: usize = 100;

    /// Turns per invocation (single-turn completions only)
    pub const TURNS_PER_CALL: u32 = 1;

    /// Error log file name inside the source directory
    pub const ERROR_LOG_FILE: &str = "error.log";
}

/// Retry preset constants
pub mod retry {
    /// Default preset: transient network errors
    pub mod default {
        pub const MAX_RETRIES: usize = 3;
        pub const MIN_DELAY_SECS: u64 = 2;
        pub const MAX_DELAY_SECS: u64 = 60;
    }

    /// Subscription preset: waits out spending caps and rate-limit windows
    pub mod subscription {
        pub const MAX_RETRIES: usize = 5;
        pub const MIN_DELAY_SECS: u64 = 300;
        pub const MAX_DELAY_SECS: u64 = 1800;
    }
}

/// Pentest config file constants
pub mod pentest_config {
    /// Maximum accepted config file size (1 MiB)
    pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

    pub const MIN_CONCURRENT_PIPELINES: usize = 1;
    pub const MAX_CONCURRENT_PIPELINES: usize = 10;
    pub const DEFAULT_CONCURRENT_PIPELINES: usize = 5;

    /// Substrings rejected anywhere in config string values
    pub const DANGEROUS_PATTERNS: &[&str] = &[
        "../",
        "<script",
        "javascript:",
        "data:text/html",
        "file://",
    ];
}
