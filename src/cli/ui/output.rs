use console::style;

use crate::types::ClassifiedError;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    /// Aligned "key: value" line
    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        println!("  {:<12} {}", style(format!("{}:", key)).dim(), value);
    }

    /// Category-specific failure with its code, retry hint and context
    pub fn classified(&self, err: &ClassifiedError) {
        let label = match err.code {
            Some(code) => format!("{} error ({})", err.category, code),
            None => format!("{} error", err.category),
        };
        self.error(&format!("{}: {}", style(label).bold(), err.message));
        if err.retryable {
            eprintln!("  {}", style("This error is transient; retrying may succeed.").dim());
        }
        for (key, value) in &err.context {
            eprintln!("  {} {}", style(format!("{}:", key)).dim(), value);
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
