//! Output Validators
//!
//! Post-success checks keyed by agent. An agent without a registered
//! validator always passes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::ExecutionSuccess;

/// Check applied to a successful agent output
pub trait OutputValidator: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` carries a human-readable reason
    fn validate(&self, source_dir: &Path, output: &ExecutionSuccess) -> Result<(), String>;
}

/// Response text must contain something other than whitespace
#[derive(Debug, Default, Clone, Copy)]
pub struct NonEmptyResponse;

impl OutputValidator for NonEmptyResponse {
    fn name(&self) -> &str {
        "non_empty_response"
    }

    fn validate(&self, _source_dir: &Path, output: &ExecutionSuccess) -> Result<(), String> {
        if output.result_text.trim().is_empty() {
            Err("agent returned an empty response".to_string())
        } else {
            Ok(())
        }
    }
}

/// Agent must leave a non-empty deliverable file in the source directory
#[derive(Debug, Clone)]
pub struct DeliverableValidator {
    relative_path: PathBuf,
}

impl DeliverableValidator {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}

impl OutputValidator for DeliverableValidator {
    fn name(&self) -> &str {
        "deliverable"
    }

    fn validate(&self, source_dir: &Path, _output: &ExecutionSuccess) -> Result<(), String> {
        let path = source_dir.join(&self.relative_path);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
            Ok(_) => Err(format!("deliverable is empty: {}", path.display())),
            Err(_) => Err(format!("deliverable missing: {}", path.display())),
        }
    }
}

/// Agent key → validator
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn OutputValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent_key: impl Into<String>, validator: Arc<dyn OutputValidator>) {
        self.validators.insert(agent_key.into(), validator);
    }

    pub fn with(mut self, agent_key: impl Into<String>, validator: Arc<dyn OutputValidator>) -> Self {
        self.register(agent_key, validator);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Missing entry passes
    pub fn validate(
        &self,
        agent_key: &str,
        source_dir: &Path,
        output: &ExecutionSuccess,
    ) -> Result<(), String> {
        match self.validators.get(agent_key) {
            Some(validator) => validator
                .validate(source_dir, output)
                .map_err(|reason| format!("{}: {}", validator.name(), reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output(text: &str) -> ExecutionSuccess {
        ExecutionSuccess {
            result_text: text.to_string(),
            duration_ms: 1,
            turn_count: 1,
            cost: 0.0,
            model_name: "gpt-4.1".to_string(),
            partial_cost: 0.0,
            api_error_detected: false,
        }
    }

    #[test]
    fn test_unregistered_agent_passes() {
        let registry = ValidatorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.validate("recon-agent", Path::new("."), &output("")).is_ok());
    }

    #[test]
    fn test_non_empty_response() {
        let registry = ValidatorRegistry::new().with("recon-agent", Arc::new(NonEmptyResponse));
        assert!(registry.validate("recon-agent", Path::new("."), &output("ok")).is_ok());

        let err = registry
            .validate("recon-agent", Path::new("."), &output("  \n"))
            .unwrap_err();
        assert!(err.starts_with("non_empty_response:"));
    }

    #[test]
    fn test_deliverable() {
        let dir = TempDir::new().unwrap();
        let validator = DeliverableValidator::new("deliverables/recon.md");

        let err = validator.validate(dir.path(), &output("ok")).unwrap_err();
        assert!(err.contains("missing"));

        std::fs::create_dir(dir.path().join("deliverables")).unwrap();
        std::fs::write(dir.path().join("deliverables/recon.md"), "").unwrap();
        assert!(validator.validate(dir.path(), &output("ok")).unwrap_err().contains("empty"));

        std::fs::write(dir.path().join("deliverables/recon.md"), "# Recon").unwrap();
        assert!(validator.validate(dir.path(), &output("ok")).is_ok());
    }
}
