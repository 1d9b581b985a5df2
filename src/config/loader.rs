//! Configuration Loader (Figment-based)
//!
//! Loads and merges runner settings from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/agentgate/config.toml)
//! 3. Project config (.agentgate/config.toml)
//! 4. Explicit settings file (--settings)
//! 5. Environment variables (AGENTGATE_* prefix, `__` separates sections)
//! 6. OpenAI environment variables (OPENAI_MODEL, OPENAI_MAX_OUTPUT_TOKENS, OPENAI_BASE_URL)
//!
//! The API key is deliberately absent: it is read from the environment at
//! validation time and never stored in configuration.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::RunnerConfig;
use crate::constants::env as env_names;
use crate::types::{GateError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → settings file → env vars
    pub fn load(settings_file: Option<&Path>) -> Result<RunnerConfig> {
        let config: RunnerConfig = Self::figment(settings_file)
            .extract()
            .map_err(|e| GateError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Build the layered figment without extracting it
    pub fn figment(settings_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(RunnerConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Some(path) = settings_file {
            debug!("Loading settings file: {}", path.display());
            figment = figment.merge(Toml::file_exact(path));
        }

        // AGENTGATE_OPENAI__REQUEST_TIMEOUT_SECS -> openai.request_timeout_secs
        figment = figment.merge(
            Env::prefixed(env_names::SETTINGS_PREFIX)
                .split("__")
                .lowercase(true),
        );

        figment
            .merge(Self::openai_env("openai.model"))
            .merge(Self::openai_env("openai.preflight_model"))
            .merge(
                Env::raw()
                    .only(&[
                        env_names::MAX_OUTPUT_TOKENS,
                        env_names::BASE_URL,
                        env_names::DISABLE_LOADER,
                    ])
                    .map(|key| {
                        let key = key.as_str();
                        if key.eq_ignore_ascii_case(env_names::MAX_OUTPUT_TOKENS) {
                            "openai.max_output_tokens".into()
                        } else if key.eq_ignore_ascii_case(env_names::BASE_URL) {
                            "openai.api_base".into()
                        } else {
                            "output.disable_loader".into()
                        }
                    }),
            )
    }

    /// OPENAI_MODEL mapped onto one settings key
    fn openai_env(target: &'static str) -> Env {
        Env::raw()
            .only(&[env_names::MODEL])
            .map(move |_| target.into())
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/agentgate/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("agentgate"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".agentgate/config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration as JSON or TOML
    pub fn render(config: &RunnerConfig, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| GateError::Config(e.to_string()))
        }
    }
}
