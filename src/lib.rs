//! agentgate - Pre-flight Gate and Resilient Execution Pipeline
//!
//! Guards and runs AI penetration-testing agents against a target
//! repository. Before any agent starts, a pre-flight gate verifies the
//! repository, the optional pentest config, and the API credentials, then
//! each agent prompt runs as a single-turn completion whose outcome is
//! always a value, never a raised error.
//!
//! ## Core Features
//!
//! - **Pre-flight Gate**: ordered, short-circuiting checks with classified failures
//! - **Error Classification**: config / network / billing taxonomy driving retries
//! - **Spending-Cap Detection**: catches capped sessions disguised as thin successes
//! - **Audit Trail**: per-agent response and error records, plus `error.log` lines
//! - **Retry Presets**: backoff tuned for transient errors or subscription caps
//!
//! ## Quick Start
//!
//! ```ignore
//! use agentgate::{AgentStep, ConfigLoader, ExecutionOptions, ExecutionPipeline};
//! use agentgate::{Orchestrator, PreflightGate, ProcessEnv, create_provider};
//!
//! let config = ConfigLoader::load(None)?;
//! let provider = create_provider(&config.openai)?;
//! let env = Arc::new(ProcessEnv);
//! let gate = PreflightGate::from_config(provider.clone(), env.clone(), &config);
//! let pipeline = ExecutionPipeline::new(provider, env, ExecutionOptions::from_config(&config));
//!
//! let report = Orchestrator::new(gate, Arc::new(pipeline))
//!     .run(&repo, None, &[AgentStep::new("Recon agent", prompt)])
//!     .await;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider, pre-flight gate, execution pipeline, audit
//! - [`config`]: runner settings and pentest config parsing
//! - [`runner`]: retrying orchestration and output validation
//! - [`cli`]: command handlers and progress output

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod runner;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{
    ConfigLoader, PentestConfig, RetryPreset, RunnerConfig, parse_config, parse_config_str,
};

// Error Types
pub use types::error::{
    ClassifiedError, ErrorCategory, ErrorClassifier, ErrorCode, GateError, Result,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use ai::{
    AuditSession, EnvSource, ExecutionOptions, ExecutionPipeline, ExecutionResult,
    JsonlAuditSession, MemoryAuditSession, PreflightGate, PreflightOutcome, ProcessEnv,
    create_provider, with_timeout,
};

pub use runner::{AgentStep, Orchestrator, RetryPolicy, RunReport, StepReport};
