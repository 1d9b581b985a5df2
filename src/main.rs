use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentgate::cli::CommandContext;
use agentgate::cli::commands::run::RunOptions;

#[derive(Parser)]
#[command(name = "agentgate")]
#[command(
    version,
    about = "Pre-flight gate and resilient execution pipeline for AI pentest agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Extra runner settings file (TOML)")]
    settings: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,

    #[arg(long, global = true, help = "Print heartbeat lines instead of the spinner")]
    no_loader: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check repository, config and API credentials
    Preflight {
        #[arg(long, help = "Target repository (must contain .git)")]
        repo: PathBuf,
        #[arg(long, help = "Pentest config file (YAML)")]
        config: Option<PathBuf>,
    },

    /// Run one agent prompt after the pre-flight gate
    Run {
        #[arg(long, help = "Target repository (must contain .git)")]
        repo: PathBuf,
        #[arg(long, help = "Pentest config file (YAML)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Agent description, e.g. \"Injection vuln agent\"")]
        agent: String,
        #[arg(long, conflicts_with = "prompt_file", required_unless_present = "prompt_file")]
        prompt: Option<String>,
        #[arg(long, help = "Read the prompt from a file")]
        prompt_file: Option<PathBuf>,
        #[arg(long, help = "Context prepended to the prompt")]
        context_file: Option<PathBuf>,
        #[arg(long, help = "Directory for the JSON Lines audit log")]
        audit_dir: Option<PathBuf>,
        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current settings (merged from all sources)
    Show {
        #[arg(long, help = "Output as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Validate a pentest config file
    Validate {
        #[arg(help = "Pentest config file (YAML)")]
        file: PathBuf,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31magentgate encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded
fn run_cli() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // Logs go to stderr so `--json` output stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = cli.settings.as_deref();

    let passed = match cli.command {
        Commands::Preflight { repo, config } => {
            let ctx = CommandContext::load(settings, cli.no_loader)?;
            let rt = Runtime::new()?;
            rt.block_on(agentgate::cli::commands::preflight::run(
                &ctx,
                &repo,
                config.as_deref(),
            ))?
        }
        Commands::Run {
            repo,
            config,
            agent,
            prompt,
            prompt_file,
            context_file,
            audit_dir,
            json,
        } => {
            let ctx = CommandContext::load(settings, cli.no_loader)?;
            let rt = Runtime::new()?;
            rt.block_on(agentgate::cli::commands::run::run(
                &ctx,
                RunOptions {
                    repo,
                    config,
                    agent,
                    prompt,
                    prompt_file,
                    context_file,
                    audit_dir,
                    json,
                },
            ))?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                agentgate::cli::commands::config::show(settings, json)?;
                true
            }
            ConfigAction::Path => {
                agentgate::cli::commands::config::path()?;
                true
            }
            ConfigAction::Validate { file } => {
                let rt = Runtime::new()?;
                rt.block_on(agentgate::cli::commands::config::validate(&file))?
            }
        },
    };

    Ok(passed)
}
