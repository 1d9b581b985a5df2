//! Config Command
//!
//! Inspect runner settings and check pentest config files.
//!
//! Usage:
//!   agentgate config show [--json]
//!   agentgate config path
//!   agentgate config validate <file>

use std::path::Path;

use crate::cli::ui::Output;
use crate::ai::preflight::config_failure;
use crate::config::{ConfigLoader, parse_config};
use crate::types::Result;

/// Show the effective settings (merged from all sources)
pub fn show(settings_file: Option<&Path>, as_json: bool) -> Result<()> {
    let config = ConfigLoader::load(settings_file)?;
    println!("{}", ConfigLoader::render(&config, as_json)?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Parse and validate a pentest config; returns whether it is valid
pub async fn validate(file: &Path) -> Result<bool> {
    let output = Output::new();

    match parse_config(file).await {
        Ok(config) => {
            output.success(&format!("{} is valid", file.display()));
            output.field("Retry", config.retry_preset());
            output.field("Parallel", config.max_concurrent_pipelines());
            if let Some(rules) = &config.rules {
                output.field("Avoid", rules.avoid.len());
                output.field("Focus", rules.focus.len());
            }
            if let Some(auth) = &config.authentication {
                output.field("Login", &auth.login_url);
            }
            Ok(true)
        }
        Err(err) => {
            output.classified(&config_failure(file, err));
            Ok(false)
        }
    }
}
