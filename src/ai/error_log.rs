//! Per-Repository Error Log
//!
//! Failed executions append one JSON object per line to
//! `<source_dir>/error.log`. Writing is best-effort: any failure here is
//! logged and dropped so it never replaces the execution outcome.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::constants::execution;
use crate::types::{GateError, Result, log_filter_warn, truncate_chars};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub error: ErrorDetails,
    pub context: ErrorContext,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub name: String,
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub stack: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub source_dir: String,
    /// First 200 characters of the prompt
    pub prompt: String,
    pub retryable: bool,
}

impl ErrorLogEntry {
    pub fn new(
        agent: &str,
        error: &GateError,
        source_dir: &Path,
        prompt: &str,
        retryable: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            error: ErrorDetails {
                name: error.name().to_string(),
                message: error.to_string(),
                code: error.code(),
                status: error.status(),
                stack: error.source_chain(),
            },
            context: ErrorContext {
                source_dir: source_dir.display().to_string(),
                prompt: truncate_chars(prompt, execution::PROMPT_PREVIEW_CHARS),
                retryable,
            },
            duration_ms,
        }
    }
}

/// Append `entry` to `<source_dir>/error.log`, swallowing any failure
pub async fn append_error_log(source_dir: &Path, entry: &ErrorLogEntry) {
    log_filter_warn(
        write_entry(source_dir, entry).await,
        "Failed to write error log",
    );
}

async fn write_entry(source_dir: &Path, entry: &ErrorLogEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(source_dir.join(execution::ERROR_LOG_FILE))
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_one_line_per_failure() {
        let dir = TempDir::new().unwrap();
        let err = GateError::Http {
            status: 429,
            body: "rate limited".to_string(),
        };
        let prompt = "x".repeat(500);
        let entry = ErrorLogEntry::new("recon-agent", &err, dir.path(), &prompt, true, 42);

        append_error_log(dir.path(), &entry).await;
        append_error_log(dir.path(), &entry).await;

        let content = std::fs::read_to_string(dir.path().join("error.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["agent"], "recon-agent");
        assert_eq!(value["error"]["name"], "HttpError");
        assert_eq!(value["error"]["status"], 429);
        assert_eq!(value["context"]["retryable"], true);
        assert_eq!(value["duration_ms"], 42);
        let logged_prompt = value["context"]["prompt"].as_str().unwrap();
        assert_eq!(logged_prompt.len(), 203);
        assert!(logged_prompt.ends_with("..."));
    }

    #[tokio::test]
    async fn test_missing_directory_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = GateError::Config("bad".to_string());
        let entry = ErrorLogEntry::new("recon-agent", &err, &missing, "p", false, 1);

        append_error_log(&missing, &entry).await;
        assert!(!missing.exists());
    }
}
