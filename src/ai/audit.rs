//! Audit Trail
//!
//! Per-agent records appended to an externally owned audit session.
//! The pipeline only ever appends; reading, rotation and retention belong
//! to whoever owns the session.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::types::{GateError, Result, SessionId, log_filter_warn};

/// One audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    LlmResponse {
        turn_index: u32,
        response_text: String,
    },
    Error {
        error: String,
        error_type: String,
        duration_ms: u64,
        turn_count_at_failure: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    pub fn new(agent: impl Into<String>, event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.into(),
            event,
        }
    }
}

/// Append-only sink for audit records
#[async_trait]
pub trait AuditSession: Send + Sync {
    fn id(&self) -> &SessionId;

    async fn append(&self, record: AuditRecord) -> Result<()>;
}

pub type SharedAuditSession = Arc<dyn AuditSession>;

// =============================================================================
// In-Memory Session
// =============================================================================

/// Session that keeps records in memory
#[derive(Debug)]
pub struct MemoryAuditSession {
    id: SessionId,
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::generate(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the records appended so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for MemoryAuditSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSession for MemoryAuditSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn append(&self, record: AuditRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
        Ok(())
    }
}

// =============================================================================
// JSON Lines Session
// =============================================================================

/// Session persisted as `<dir>/<session-id>.jsonl`
#[derive(Debug)]
pub struct JsonlAuditSession {
    id: SessionId,
    path: PathBuf,
}

impl JsonlAuditSession {
    /// Create the audit directory if needed and bind a fresh session to it
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let id = SessionId::generate();
        let path = dir.join(format!("{}.jsonl", id));
        Ok(Self { id, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSession for JsonlAuditSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn append(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

// =============================================================================
// Logger
// =============================================================================

/// Agent-scoped writer over an optional session
///
/// Unbound loggers do nothing. Append failures are logged at warn and dropped.
pub struct AuditLogger {
    session: Option<SharedAuditSession>,
    agent: String,
}

impl AuditLogger {
    pub fn new(session: Option<SharedAuditSession>, agent: impl Into<String>) -> Self {
        Self {
            session,
            agent: agent.into(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    pub async fn log_llm_response(&self, turn_index: u32, response_text: &str) {
        self.append(AuditEvent::LlmResponse {
            turn_index,
            response_text: response_text.to_string(),
        })
        .await;
    }

    pub async fn log_error(&self, error: &GateError, duration_ms: u64, turn_count: u32) {
        self.append(AuditEvent::Error {
            error: error.to_string(),
            error_type: error.name().to_string(),
            duration_ms,
            turn_count_at_failure: turn_count,
        })
        .await;
    }

    async fn append(&self, event: AuditEvent) {
        let Some(session) = &self.session else {
            return;
        };
        let record = AuditRecord::new(self.agent.clone(), event);
        log_filter_warn(session.append(record).await, "Audit append failed");
    }
}
