//! AI Integration Layer
//!
//! Everything between an agent prompt and the remote completion API: the
//! pre-flight gate, the single-turn execution pipeline, and the audit and
//! error-log side channels around them.

pub mod audit;
pub mod context;
pub mod credential;
pub mod error_log;
pub mod execution;
pub mod preflight;
pub mod provider;
pub mod timeout;
pub mod timing;

pub use audit::{
    AuditEvent, AuditLogger, AuditRecord, AuditSession, JsonlAuditSession, MemoryAuditSession,
    SharedAuditSession,
};
pub use context::{ExecutionContext, OutputMode};
pub use credential::{Credential, EnvSource, ProcessEnv};
pub use error_log::{ErrorLogEntry, append_error_log};
pub use execution::{
    ExecutionFailure, ExecutionOptions, ExecutionPipeline, ExecutionResult, ExecutionSuccess,
};
pub use preflight::{PreflightGate, PreflightOutcome};
pub use provider::{
    Completion, CompletionProvider, CompletionRequest, OpenAiProvider, SharedProvider,
    create_provider,
};
pub use timeout::with_timeout;
pub use timing::Timer;
