//! Execution Progress Reporting
//!
//! One reporter per agent call. Events go out on a broadcast channel for
//! any attached UI, while the reporter itself renders either a spinner
//! (interactive, verbose agents) or a periodic heartbeat line (loader
//! disabled). Clean-mode agents only report start and finish.

use std::time::{Duration, Instant};

use console::{Term, style};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ai::context::OutputMode;
use crate::constants::execution;
use crate::types::{format_duration_ms, truncate_chars};

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const SPINNER_TICK: Duration = Duration::from_millis(100);

/// Progress event types
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { agent: String },
    /// Call still in flight
    Heartbeat { agent: String, elapsed_secs: u64 },
    Finished { agent: String, summary: String },
    Stopped { agent: String, summary: String },
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressOptions {
    /// Replace the animated loader with heartbeat lines
    pub disable_loader: bool,
    pub heartbeat_interval: Duration,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            disable_loader: false,
            heartbeat_interval: Duration::from_secs(execution::HEARTBEAT_INTERVAL_SECS),
        }
    }
}

/// Progress reporter for one agent call
pub struct ProgressReporter {
    agent: String,
    mode: OutputMode,
    options: ProgressOptions,
    sender: broadcast::Sender<ProgressEvent>,
    started: Option<Instant>,
    task: Option<JoinHandle<()>>,
    spinner_active: bool,
}

impl ProgressReporter {
    pub fn new(agent: impl Into<String>, mode: OutputMode, options: ProgressOptions) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            agent: agent.into(),
            mode,
            options,
            sender,
            started: None,
            task: None,
            spinner_active: false,
        }
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Receivers may not exist if no UI is attached
    fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn start(&mut self) {
        if self.started.is_some() {
            return;
        }
        let started = Instant::now();
        self.started = Some(started);
        self.emit(ProgressEvent::Started {
            agent: self.agent.clone(),
        });

        if self.options.disable_loader {
            info!("[{}] started", self.agent);
            self.task = Some(self.spawn_heartbeat(started));
        } else if self.mode == OutputMode::Verbose && Term::stderr().is_term() {
            self.spinner_active = true;
            self.task = Some(self.spawn_spinner(started));
        } else {
            info!("[{}] started", self.agent);
        }
    }

    /// Completed successfully
    pub fn finish(&mut self, summary: &str) {
        self.halt();
        info!(
            "{} [{}] {}",
            style("✓").green(),
            self.agent,
            summary
        );
        self.emit(ProgressEvent::Finished {
            agent: self.agent.clone(),
            summary: summary.to_string(),
        });
    }

    /// Failed
    pub fn stop(&mut self, summary: &str) {
        self.halt();
        warn!("{} [{}] {}", style("✗").red(), self.agent, summary);
        self.emit(ProgressEvent::Stopped {
            agent: self.agent.clone(),
            summary: summary.to_string(),
        });
    }

    fn halt(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if std::mem::take(&mut self.spinner_active) {
            let _ = Term::stderr().clear_line();
        }
    }

    fn spawn_heartbeat(&self, started: Instant) -> JoinHandle<()> {
        let agent = self.agent.clone();
        let sender = self.sender.clone();
        let period = self.options.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let elapsed = started.elapsed();
                info!(
                    "[{}] still running ({})",
                    agent,
                    format_duration_ms(elapsed.as_millis() as u64)
                );
                let _ = sender.send(ProgressEvent::Heartbeat {
                    agent: agent.clone(),
                    elapsed_secs: elapsed.as_secs(),
                });
            }
        })
    }

    fn spawn_spinner(&self, started: Instant) -> JoinHandle<()> {
        let agent = self.agent.clone();

        tokio::spawn(async move {
            let term = Term::stderr();
            let mut frame = 0usize;
            loop {
                let elapsed = format_duration_ms(started.elapsed().as_millis() as u64);
                let _ = term.clear_line();
                let _ = term.write_str(&format!(
                    "{} {} {}",
                    style(SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]).cyan(),
                    agent,
                    style(elapsed).dim()
                ));
                frame += 1;
                tokio::time::sleep(SPINNER_TICK).await;
            }
        })
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// "N turns, duration"
pub fn success_summary(turn_count: u32, duration_ms: u64) -> String {
    format!("{} turns, {}", turn_count, format_duration_ms(duration_ms))
}

/// Error message cut to a single short line, plus duration
pub fn error_summary(message: &str, duration_ms: u64) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    format!(
        "{} ({})",
        truncate_chars(first_line, execution::ERROR_SUMMARY_CHARS),
        format_duration_ms(duration_ms)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(disable_loader: bool, heartbeat_ms: u64) -> ProgressOptions {
        ProgressOptions {
            disable_loader,
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_emits_while_running() {
        let mut reporter =
            ProgressReporter::new("recon-agent", OutputMode::Verbose, options(true, 10));
        let mut rx = reporter.subscribe();

        reporter.start();
        assert!(reporter.is_running());
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Started {
                agent: "recon-agent".to_string()
            }
        );

        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(next, ProgressEvent::Heartbeat { .. }));

        reporter.finish("1 turns, 10ms");
        assert!(!reporter.is_running());
    }

    #[tokio::test]
    async fn test_clean_mode_reports_start_and_finish_only() {
        let mut reporter =
            ProgressReporter::new("xss-vuln-agent", OutputMode::Clean, options(false, 10));
        let mut rx = reporter.subscribe();

        reporter.start();
        assert!(!reporter.is_running());
        reporter.stop("boom (5ms)");

        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::Started { .. }));
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Stopped {
                agent: "xss-vuln-agent".to_string(),
                summary: "boom (5ms)".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut reporter =
            ProgressReporter::new("recon-agent", OutputMode::Clean, options(true, 1000));
        let mut rx = reporter.subscribe();
        reporter.start();
        reporter.start();
        reporter.finish("done");

        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::Started { .. }));
        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::Finished { .. }));
    }

    #[test]
    fn test_summaries() {
        assert_eq!(success_summary(1, 1500), "1 turns, 1.5s");

        let long = "e".repeat(300);
        let summary = error_summary(&long, 20);
        assert!(summary.starts_with(&"e".repeat(100)));
        assert!(summary.ends_with("... (20ms)"));

        assert_eq!(error_summary("first\nsecond", 5), "first (5ms)");
    }
}
