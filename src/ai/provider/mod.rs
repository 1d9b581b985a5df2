//! LLM Provider Abstraction
//!
//! Defines the `CompletionProvider` trait for single-turn completions.
//! The execution pipeline and the preflight gate both talk to the remote
//! API only through this trait.

mod openai;

pub use openai::OpenAiProvider;

use async_trait::async_trait;
use std::sync::Arc;

use crate::ai::credential::Credential;
use crate::config::OpenAiSettings;
use crate::types::Result;

/// One single-turn completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    /// Sole user message
    pub prompt: String,
    pub max_completion_tokens: u32,
}

/// Completion returned by the provider
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Response text (empty when the provider returned none)
    pub text: String,
    /// Model that actually served the request
    pub model: String,
    /// Reported token usage; informational only
    pub total_tokens: Option<u32>,
}

/// Shared provider type for concurrent pipeline instances.
pub type SharedProvider = Arc<dyn CompletionProvider>;

/// Completion provider trait
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue exactly one completion request.
    ///
    /// Non-success HTTP responses are errors carrying status and body.
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<Completion>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Create the shared provider from settings
pub fn create_provider(settings: &OpenAiSettings) -> Result<SharedProvider> {
    Ok(Arc::new(OpenAiProvider::new(&settings.api_base)?))
}
