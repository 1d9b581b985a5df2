//! Run Command
//!
//! Gate the repository, then execute one agent prompt with retries.
//!
//! Usage:
//!   agentgate run --repo <path> --agent <description> --prompt <text>
//!   agentgate run --repo <path> --agent <description> --prompt-file <file> \
//!       [--context-file <file>] [--config <yaml>] [--audit-dir <dir>] [--json]

use std::path::PathBuf;
use std::sync::Arc;

use crate::ai::{ExecutionResult, JsonlAuditSession};
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, read_text_file};
use crate::runner::{AgentStep, NonEmptyResponse, Orchestrator, RunReport, ValidatorRegistry};
use crate::types::{GateError, Result, format_duration_ms, slugify};

pub struct RunOptions {
    pub repo: PathBuf,
    pub config: Option<PathBuf>,
    pub agent: String,
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub context_file: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    pub json: bool,
}

/// Returns whether the run passed
pub async fn run(ctx: &CommandContext, options: RunOptions) -> Result<bool> {
    let prompt = match (&options.prompt, &options.prompt_file) {
        (Some(prompt), _) => prompt.clone(),
        (None, Some(path)) => read_text_file(path, "prompt")?,
        (None, None) => {
            return Err(GateError::Config(
                "Either --prompt or --prompt-file is required".to_string(),
            ));
        }
    };
    let context = match &options.context_file {
        Some(path) => read_text_file(path, "context")?,
        None => String::new(),
    };

    let validators =
        ValidatorRegistry::new().with(slugify(&options.agent), Arc::new(NonEmptyResponse));
    let mut orchestrator =
        Orchestrator::new(ctx.gate(), Arc::new(ctx.pipeline())).with_validators(validators);
    if let Some(dir) = &options.audit_dir {
        let session = JsonlAuditSession::open(dir).await?;
        tracing::info!("Audit log: {}", session.path().display());
        orchestrator = orchestrator.with_audit_session(Arc::new(session));
    }

    let step = AgentStep::new(&options.agent, prompt).with_context(context);
    let report = orchestrator
        .run(&options.repo, options.config.as_deref(), &[step])
        .await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.is_success())
}

fn print_report(report: &RunReport) {
    let output = Output::new();

    if let Some(err) = &report.preflight_error {
        output.classified(err);
        return;
    }

    for step in &report.steps {
        output.header(&step.description);
        output.field("Attempts", step.attempts);
        output.field("Duration", format_duration_ms(step.result.duration_ms()));

        match &step.result {
            ExecutionResult::Success(success) => {
                output.field("Model", &success.model_name);
                output.field("Turns", success.turn_count);
                output.field("Cost", format!("${:.4}", success.cost));
                if success.api_error_detected {
                    output.warning("Response mentions an API error");
                }
                match &step.validation_error {
                    Some(reason) => output.error(&format!("Output rejected: {}", reason)),
                    None => output.success("Agent completed"),
                }
                println!("\n{}", success.result_text);
            }
            ExecutionResult::Failure(failure) => {
                output.field("Category", failure.category);
                if let Some(code) = failure.code {
                    output.field("Code", code);
                }
                output.error(&format!(
                    "{}: {}",
                    failure.error_type_name, failure.error_message
                ));
            }
        }
    }
}
