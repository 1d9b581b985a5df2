//! CLI Common Utilities
//!
//! Shared initialization for CLI commands: resolved settings, the shared
//! provider, and the environment the credential is read from.

use std::path::Path;
use std::sync::Arc;

use crate::ai::{
    EnvSource, ExecutionOptions, ExecutionPipeline, PreflightGate, ProcessEnv, SharedProvider,
    create_provider,
};
use crate::config::{ConfigLoader, RunnerConfig};
use crate::types::{GateError, Result};

/// Command execution context
pub struct CommandContext {
    pub config: RunnerConfig,
    pub provider: SharedProvider,
    pub env: Arc<dyn EnvSource>,
}

impl CommandContext {
    /// Load settings and build the provider.
    ///
    /// `no_loader` forces heartbeat lines regardless of configuration.
    pub fn load(settings_file: Option<&Path>, no_loader: bool) -> Result<Self> {
        let mut config = ConfigLoader::load(settings_file)?;
        if no_loader {
            config.output.disable_loader = true;
        }
        let provider = create_provider(&config.openai)?;

        Ok(Self {
            config,
            provider,
            env: Arc::new(ProcessEnv),
        })
    }

    pub fn gate(&self) -> PreflightGate {
        PreflightGate::from_config(self.provider.clone(), self.env.clone(), &self.config)
    }

    pub fn pipeline(&self) -> ExecutionPipeline {
        ExecutionPipeline::new(
            self.provider.clone(),
            self.env.clone(),
            ExecutionOptions::from_config(&self.config),
        )
    }
}

/// Read a prompt or context file, naming the file on failure
pub fn read_text_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        GateError::Config(format!("Cannot read {} file {}: {}", what, path.display(), e))
    })
}
