//! Execution Context Detection
//!
//! Derives per-call presentation settings from the step description.
//! Vulnerability and exploitation agents run side by side, so their
//! progress output is kept to start/finish lines.

use crate::types::slugify;

/// How much progress output a call produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Animated loader plus completion line
    Verbose,
    /// Completion line only
    Clean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Stable key for logs and validator lookup (e.g. "injection-vuln-agent")
    pub agent_key: String,
    /// Runs alongside other agents
    pub is_parallel: bool,
    pub output_mode: OutputMode,
}

impl ExecutionContext {
    pub fn detect(description: &str) -> Self {
        let agent_key = slugify(description);
        let is_parallel = agent_key
            .split('-')
            .any(|word| matches!(word, "vuln" | "vulnerability" | "exploit" | "exploitation"));

        Self {
            agent_key,
            is_parallel,
            output_mode: if is_parallel {
                OutputMode::Clean
            } else {
                OutputMode::Verbose
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_agents_use_clean_output() {
        let ctx = ExecutionContext::detect("Injection vuln agent");
        assert_eq!(ctx.agent_key, "injection-vuln-agent");
        assert!(ctx.is_parallel);
        assert_eq!(ctx.output_mode, OutputMode::Clean);

        assert!(ExecutionContext::detect("XSS exploit agent").is_parallel);
    }

    #[test]
    fn test_sequential_agents_use_verbose_output() {
        let ctx = ExecutionContext::detect("Pre-recon agent");
        assert_eq!(ctx.agent_key, "pre-recon-agent");
        assert!(!ctx.is_parallel);
        assert_eq!(ctx.output_mode, OutputMode::Verbose);
    }

    #[test]
    fn test_substring_does_not_trigger() {
        // "vulnerable" is not the "vuln" agent marker
        assert!(!ExecutionContext::detect("Report vulnerable endpoints").is_parallel);
    }
}
