//! Preflight Command
//!
//! Run the pre-flight gate on its own.
//!
//! Usage:
//!   agentgate preflight --repo <path> [--config <yaml>]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

/// Returns whether every check passed
pub async fn run(ctx: &CommandContext, repo: &Path, config: Option<&Path>) -> Result<bool> {
    let output = Output::new();
    output.header("Pre-flight checks");
    output.field("Repository", repo.display());
    if let Some(config) = config {
        output.field("Config", config.display());
    }
    output.field("Model", &ctx.config.openai.preflight_model);

    match ctx.gate().run_preflight_checks(repo, config).await {
        Ok(()) => {
            output.success("All pre-flight checks passed");
            Ok(true)
        }
        Err(err) => {
            output.classified(&err);
            Ok(false)
        }
    }
}
